use crate::db::Db;
use rocket::serde::json::Json;
use rocket::{get, State};
use std::sync::Arc;

#[get("/health")]
pub fn health(db: &State<Arc<Db>>) -> Json<serde_json::Value> {
    let db_ok = db.conn().execute_batch("SELECT 1").is_ok();
    Json(serde_json::json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "service": "filedrop-core",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Coarse operational counters, not the ambient-stack `metrics` surface
/// §2 explicitly calls a non-goal — this is a plain JSON snapshot for a
/// human or a cheap external prober, not a Prometheus exposition format.
#[get("/metrics")]
pub fn metrics(db: &State<Arc<Db>>) -> Json<serde_json::Value> {
    let conn = db.conn();
    let available: i64 = conn
        .query_row("SELECT COUNT(*) FROM shares WHERE state = 'available'", [], |r| r.get(0))
        .unwrap_or(0);
    let pending: i64 = conn
        .query_row("SELECT COUNT(*) FROM shares WHERE state = 'pending_upload'", [], |r| r.get(0))
        .unwrap_or(0);
    let expired: i64 = conn
        .query_row("SELECT COUNT(*) FROM shares WHERE state = 'expired'", [], |r| r.get(0))
        .unwrap_or(0);
    let bytes_stored: i64 = conn
        .query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM shares WHERE state IN ('available', 'pending_upload')",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);
    let downloads_total: i64 = conn
        .query_row("SELECT COUNT(*) FROM download_events", [], |r| r.get(0))
        .unwrap_or(0);

    Json(serde_json::json!({
        "shares_available": available,
        "shares_pending_upload": pending,
        "shares_expired": expired,
        "bytes_stored": bytes_stored,
        "downloads_total": downloads_total,
    }))
}

#[rocket::catch(429)]
pub fn too_many_requests() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": {"code": "rate_limited", "message": "too many requests"}}))
}

#[rocket::catch(404)]
pub fn not_found() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": {"code": "not_found", "message": "no longer available"}}))
}
