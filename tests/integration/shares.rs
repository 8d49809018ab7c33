use crate::common::{test_client, upload_complete_share};
use rocket::http::{ContentType, Status};

// S1: cloud round trip — presign, PUT via the in-memory object store stub,
// finalize, fetch metadata, issue a download, then GET the bytes back.
#[test]
fn upload_finalize_download_round_trip() {
    let client = test_client();
    let bytes = b"hello from the other side of the wire";

    let (share_id, presign) = upload_complete_share(&client, "notes.txt", bytes, "text/plain", 2 * 3600, None);
    assert_eq!(presign["upload_method"], "PUT");

    let res = client.get(format!("/share/{share_id}")).dispatch();
    assert_eq!(res.status(), Status::Ok);
    let view: serde_json::Value = res.into_json().unwrap();
    assert_eq!(view["state"], "available");
    assert_eq!(view["original_name"], "notes.txt");
    assert_eq!(view["has_password"], false);

    let res = client
        .post(format!("/share/{share_id}/download"))
        .header(ContentType::JSON)
        .body(serde_json::json!({}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
    let download: serde_json::Value = res.into_json().unwrap();
    assert_eq!(download["filename"], "notes.txt");
    assert_eq!(download["size_bytes"], bytes.len() as i64);

    let download_url = download["download_url"].as_str().unwrap().to_string();
    let download_path = download_url.splitn(2, "/__object_store").nth(1).unwrap();
    let res = client.get(format!("/__object_store{download_path}")).dispatch();
    assert_eq!(res.status(), Status::Ok);
    assert_eq!(res.into_bytes().unwrap(), bytes);
}

/// A `GET /files/{share_id}` alias must describe the same share as
/// `GET /share/{share_id}` (SPEC_FULL.md supplement).
#[test]
fn files_alias_matches_share_view() {
    let client = test_client();
    let (share_id, _) = upload_complete_share(&client, "alias.bin", b"x", "application/octet-stream", 2 * 3600, None);

    let via_share: serde_json::Value = client.get(format!("/share/{share_id}")).dispatch().into_json().unwrap();
    let via_files: serde_json::Value = client.get(format!("/files/{share_id}")).dispatch().into_json().unwrap();
    assert_eq!(via_share, via_files);
}

// S2: password-gated download.
#[test]
fn download_requires_correct_password() {
    let client = test_client();
    let bytes = b"top secret payload";
    let (share_id, _) = upload_complete_share(&client, "secret.bin", bytes, "application/octet-stream", 2 * 3600, Some("hunter2"));

    let res = client
        .post(format!("/share/{share_id}/download"))
        .header(ContentType::JSON)
        .body(serde_json::json!({}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::new(423));

    let res = client
        .post(format!("/share/{share_id}/download"))
        .header(ContentType::JSON)
        .body(serde_json::json!({"password": "wrong"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::new(423));

    let res = client
        .post(format!("/share/{share_id}/download"))
        .header(ContentType::JSON)
        .body(serde_json::json!({"password": "hunter2"}).to_string())
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn share_view_never_exposes_password_hash() {
    let client = test_client();
    let (share_id, _) = upload_complete_share(&client, "secret.bin", b"x", "application/octet-stream", 2 * 3600, Some("hunter2"));

    let res = client.get(format!("/share/{share_id}")).dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["has_password"], true);
    assert!(body.get("password_hash").is_none());
    assert!(body.as_object().unwrap().keys().all(|k| !k.contains("password_hash")));
}

#[test]
fn unknown_share_id_and_deleted_share_both_report_gone() {
    let client = test_client();
    let res = client.get("/share/does-not-exist").dispatch();
    assert_eq!(res.status(), Status::NotFound);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["error"]["message"], "no longer available");
}

#[test]
fn oversize_upload_is_rejected_before_any_object_exists() {
    let client = test_client();
    let res = client
        .post("/upload/presign")
        .header(ContentType::JSON)
        .body(
            serde_json::json!({
                "original_name": "huge.bin",
                "size_bytes": 50i64 * 1024 * 1024 * 1024,
                "mime_type": "application/octet-stream",
                "expiry_secs": 2 * 3600,
            })
            .to_string(),
        )
        .dispatch();
    assert_eq!(res.status(), Status::PayloadTooLarge);
}

#[test]
fn disallowed_expiry_duration_is_rejected() {
    let client = test_client();
    let res = client
        .post("/upload/presign")
        .header(ContentType::JSON)
        .body(
            serde_json::json!({
                "original_name": "file.bin",
                "size_bytes": 10,
                "mime_type": "application/octet-stream",
                "expiry_secs": 42,
            })
            .to_string(),
        )
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
}
