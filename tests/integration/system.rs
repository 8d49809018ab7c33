use crate::common::{test_client, upload_complete_share};
use rocket::http::Status;

#[test]
fn health_reports_ok_against_a_fresh_database() {
    let client = test_client();
    let res = client.get("/health").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["status"], "ok");
}

#[test]
fn metrics_reflects_shares_created_and_downloaded() {
    let client = test_client();
    let (share_id, _) = upload_complete_share(&client, "m.bin", b"hi", "application/octet-stream", 2 * 3600, None);

    let res = client.get("/metrics").dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["shares_available"], 1);
    assert_eq!(body["downloads_total"], 0);

    client
        .post(format!("/share/{share_id}/download"))
        .header(rocket::http::ContentType::JSON)
        .body(serde_json::json!({}).to_string())
        .dispatch();

    let res = client.get("/metrics").dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["downloads_total"], 1);
}

#[test]
fn room_snapshot_reports_zero_peers_for_an_unused_room() {
    let client = test_client();
    let res = client.get("/rooms/never-joined").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["peer_count"], 0);
}
