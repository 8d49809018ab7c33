//! Expiry sweeper (§4.4): the background process that is the only writer
//! of the `available|pending_upload -> expired -> deleted` transition on a
//! timeout (as opposed to `revoke`, which is owner-initiated). Grounded on
//! the teacher's `retention::spawn_retention_task` — a periodic
//! `tokio::spawn` loop over a dedicated DB connection — generalized from
//! per-room message pruning to per-share lifecycle transitions plus the
//! object-store deletes a message retention policy never needed.

use crate::config::AppConfig;
use crate::db::Db;
use crate::storage::object_store::ObjectStore;
use std::sync::Arc;
use std::time::Duration;

/// Result of a single sweep, logged at `info` and useful for tests.
#[derive(Debug, Clone, Default)]
pub struct SweepResult {
    pub expired: usize,
    pub object_deletes_failed: usize,
    pub hard_deleted: usize,
}

/// Spawns the periodic sweeper as a long-running task. Intended to be
/// attached via `AdHoc::on_liftoff`, matching the teacher's pattern of
/// starting background work once Rocket has finished lifting off rather
/// than before the server is ready to serve traffic.
pub fn spawn_sweeper(db: Arc<Db>, store: Arc<dyn ObjectStore>, config: Arc<AppConfig>) {
    tokio::spawn(async move {
        tokio::time::sleep(STARTUP_DELAY).await;
        loop {
            let result = run_sweep(&db, store.as_ref(), &config).await;
            if result.expired > 0 || result.hard_deleted > 0 || result.object_deletes_failed > 0 {
                tracing::info!(
                    expired = result.expired,
                    object_deletes_failed = result.object_deletes_failed,
                    hard_deleted = result.hard_deleted,
                    "expiry sweep completed"
                );
            }
            tokio::time::sleep(config.sweep_interval).await;
        }
    });
}

/// One sweep pass (§4.4):
/// 1. select+expire a bounded batch of shares past `expires_at + grace`
/// 2. best-effort delete their objects (failures retried next sweep —
///    the share stays `expired`, not `deleted`, until its object is gone)
/// 3. hard-delete `deleted` rows past the retention window
pub async fn run_sweep(db: &Db, store: &dyn ObjectStore, config: &AppConfig) -> SweepResult {
    let mut result = SweepResult::default();
    let now = chrono::Utc::now();
    let grace_cutoff = (now - chrono::Duration::from_std(config.sweep_grace).unwrap_or_default())
        .to_rfc3339();

    let expired = match db.sweep_select_and_expire(&now.to_rfc3339(), &grace_cutoff, config.sweep_batch_size) {
        Ok(shares) => shares,
        Err(e) => {
            tracing::error!(error = %e, "sweep selection failed");
            return result;
        }
    };
    result.expired = expired.len();

    for share in &expired {
        match store.delete(&share.storage_key).await {
            Ok(()) => {
                if let Err(e) = db.transition_to_deleted(&share.share_id) {
                    tracing::error!(error = %e, share_id = %share.share_id, "failed to mark share deleted after object delete");
                }
            }
            Err(e) => {
                result.object_deletes_failed += 1;
                tracing::warn!(
                    error = %e,
                    share_id = %share.share_id,
                    "object delete failed, will retry next sweep"
                );
            }
        }
    }

    let cutoff = config
        .deleted_retention
        .map(|retention| (now - chrono::Duration::from_std(retention).unwrap_or_default()).to_rfc3339());
    match db.hard_delete_expired_retention(cutoff.as_deref()) {
        Ok(n) => result.hard_deleted = n,
        Err(e) => tracing::error!(error = %e, "hard-delete retention pass failed"),
    }

    result
}

/// Default interval used when `AppConfig` is unavailable at call sites that
/// only need a sane starting delay before the first sweep (mirrors the
/// teacher's fixed 30s startup grace in `spawn_retention_task`).
pub const STARTUP_DELAY: Duration = Duration::from_secs(30);
