use rocket::local::blocking::Client;

/// Wrapper around Client that auto-deletes the temp DB on drop. Prevents
/// `/tmp/filedrop_test_*.db` file accumulation across a large test suite.
/// Uses `Option<Client>` so the SQLite connection (held open in WAL mode)
/// is dropped before the file is removed.
pub struct TestClient {
    client: Option<Client>,
    db_path: String,
}

impl Drop for TestClient {
    fn drop(&mut self) {
        drop(self.client.take());
        let _ = std::fs::remove_file(&self.db_path);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_path));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_path));
    }
}

impl std::ops::Deref for TestClient {
    type Target = Client;
    fn deref(&self) -> &Client {
        self.client.as_ref().unwrap()
    }
}

fn unique_db_path() -> String {
    format!(
        "/tmp/filedrop_test_{}.db",
        uuid::Uuid::new_v4().to_string().split('-').next().unwrap()
    )
}

pub fn test_client() -> TestClient {
    let db_path = unique_db_path();
    let rocket = filedrop_core::rocket_with_db(&db_path);
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestClient { client: Some(client), db_path }
}

pub fn test_client_with_config(config: filedrop_core::config::AppConfig) -> TestClient {
    let db_path = unique_db_path();
    let rocket = filedrop_core::rocket_with_db_and_config(&db_path, config);
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestClient { client: Some(client), db_path }
}

/// Issues an upload presign, PUTs the given bytes at the returned URL via
/// the in-memory object store stub, and finalizes the upload. Returns
/// (share_id, upload response body).
pub fn upload_complete_share(
    client: &Client,
    original_name: &str,
    bytes: &[u8],
    mime_type: &str,
    expiry_secs: i64,
    password: Option<&str>,
) -> (String, serde_json::Value) {
    use rocket::http::{ContentType, Status};

    let res = client
        .post("/upload/presign")
        .header(ContentType::JSON)
        .body(
            serde_json::json!({
                "original_name": original_name,
                "size_bytes": bytes.len() as i64,
                "mime_type": mime_type,
                "expiry_secs": expiry_secs,
                "password": password,
            })
            .to_string(),
        )
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let presign: serde_json::Value = res.into_json().unwrap();
    let share_id = presign["share_id"].as_str().unwrap().to_string();
    let upload_url = presign["upload_url"].as_str().unwrap().to_string();

    let upload_path = upload_url.splitn(2, "/__object_store").nth(1).expect("in-memory stub url");
    let res = client
        .put(format!("/__object_store{upload_path}"))
        .body(bytes.to_vec())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    let res = client
        .post("/upload/finalize")
        .header(ContentType::JSON)
        .body(serde_json::json!({"share_id": share_id, "actual_size": bytes.len() as i64}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);

    (share_id, presign)
}
