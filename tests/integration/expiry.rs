use filedrop_core::db::Db;
use filedrop_core::expiry::run_sweep;
use filedrop_core::storage::{InMemoryObjectStore, ObjectStore};
use std::time::Duration;

fn test_db() -> (Db, String) {
    let path = format!("/tmp/filedrop_test_expiry_{}.db", uuid::Uuid::new_v4().simple());
    (Db::new(&path), path)
}

fn default_test_config() -> filedrop_core::config::AppConfig {
    let mut config = filedrop_core::config::AppConfig::from_env();
    config.sweep_grace = Duration::from_secs(0);
    config
}

// S3: a share past its expiry + grace window is swept to `expired`, its
// object deleted, then hard-deleted once past the retention window — and a
// concurrent download issuance loses the race once the sweep has run.
#[tokio::test]
async fn sweep_expires_share_and_deletes_its_object() {
    let (db, path) = test_db();
    let store = InMemoryObjectStore::new("http://test".to_string());
    store.put_bytes("share-1/payload.bin", b"data".to_vec());

    let past = (chrono::Utc::now() - chrono::Duration::seconds(10)).to_rfc3339();
    let created = (chrono::Utc::now() - chrono::Duration::seconds(20)).to_rfc3339();
    db.create_share_pending("share-1", None, "share-1/payload.bin", "payload.bin", 4, "application/octet-stream", None, &created, &past)
        .unwrap();
    db.mark_share_available("share-1").unwrap();

    let config = default_test_config();
    let result = run_sweep(&db, &store, &config).await;
    assert_eq!(result.expired, 1);
    assert_eq!(result.object_deletes_failed, 0);

    let share = db.get_share_by_id("share-1").unwrap().unwrap();
    assert_eq!(share.state, "deleted");
    assert!(!store.exists("share-1/payload.bin").await.unwrap());

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn sweep_does_not_touch_unexpired_shares() {
    let (db, path) = test_db();
    let store = InMemoryObjectStore::new("http://test".to_string());
    store.put_bytes("share-2/payload.bin", b"data".to_vec());

    let future = (chrono::Utc::now() + chrono::Duration::hours(2)).to_rfc3339();
    let now = chrono::Utc::now().to_rfc3339();
    db.create_share_pending("share-2", None, "share-2/payload.bin", "payload.bin", 4, "application/octet-stream", None, &now, &future)
        .unwrap();
    db.mark_share_available("share-2").unwrap();

    let config = default_test_config();
    let result = run_sweep(&db, &store, &config).await;
    assert_eq!(result.expired, 0);

    let share = db.get_share_by_id("share-2").unwrap().unwrap();
    assert_eq!(share.state, "available");

    let _ = std::fs::remove_file(&path);
}

// Invariant: a download that wins the race against the sweep must succeed,
// and once the sweep has expired the share, a download must never succeed
// afterwards — there is no window where both see it as available.
#[tokio::test]
async fn download_count_increment_loses_race_to_already_expired_share() {
    let (db, path) = test_db();

    let past = (chrono::Utc::now() - chrono::Duration::seconds(5)).to_rfc3339();
    let created = (chrono::Utc::now() - chrono::Duration::seconds(30)).to_rfc3339();
    db.create_share_pending("share-3", None, "share-3/payload.bin", "payload.bin", 4, "application/octet-stream", None, &created, &past)
        .unwrap();
    db.mark_share_available("share-3").unwrap();

    let now = chrono::Utc::now().to_rfc3339();
    let result = db.increment_download_count("share-3", &now).unwrap();
    assert!(result.is_none(), "download must not succeed once expires_at has passed");

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn hard_delete_respects_retention_window() {
    let (db, path) = test_db();
    let store = InMemoryObjectStore::new("http://test".to_string());

    let past = (chrono::Utc::now() - chrono::Duration::seconds(10)).to_rfc3339();
    let created = (chrono::Utc::now() - chrono::Duration::seconds(20)).to_rfc3339();
    db.create_share_pending("share-4", None, "share-4/payload.bin", "payload.bin", 4, "application/octet-stream", None, &created, &past)
        .unwrap();
    db.mark_share_available("share-4").unwrap();

    let mut config = default_test_config();
    config.deleted_retention = Some(Duration::from_secs(3600));
    run_sweep(&db, &store, &config).await;

    // Still present as `deleted` — retention window hasn't elapsed.
    assert!(db.get_share_by_id("share-4").unwrap().is_some());

    config.deleted_retention = Some(Duration::from_secs(0));
    run_sweep(&db, &store, &config).await;
    assert!(db.get_share_by_id("share-4").unwrap().is_none());

    let _ = std::fs::remove_file(&path);
}
