//! `/__object_store/{key}` stand-in routes: only mounted when
//! `InMemoryObjectStore` is the active backend (no S3 endpoint configured),
//! giving presigned URLs somewhere real to PUT/GET against so the full
//! upload -> finalize -> download round trip (§8 scenario S1) is
//! exercisable without a live bucket.

use crate::storage::object_store::InMemoryObjectStore;
use rocket::data::{Data, ToByteUnit};
use rocket::http::ContentType;
use rocket::{get, put, State};
use std::sync::Arc;

#[put("/__object_store/<key..>", data = "<body>")]
pub async fn object_store_put(
    store: &State<Arc<InMemoryObjectStore>>,
    key: std::path::PathBuf,
    body: Data<'_>,
) -> Result<&'static str, std::io::Error> {
    let bytes = body.open(5.gibibytes()).into_bytes().await?.into_inner();
    store.put_bytes(&key.to_string_lossy(), bytes);
    Ok("ok")
}

#[get("/__object_store/<key..>?<filename>")]
pub fn object_store_get(
    store: &State<Arc<InMemoryObjectStore>>,
    key: std::path::PathBuf,
    filename: Option<&str>,
) -> Option<(ContentType, Vec<u8>)> {
    let bytes = store.get_bytes(&key.to_string_lossy())?;
    let _ = filename;
    Some((ContentType::Binary, bytes))
}
