//! Metadata repository (§4.3): the only writer of [`Share`] rows, and the
//! sole enforcer of the share state machine's transactional guards.
//!
//! Grounded on the teacher's `db.rs` (raw `rusqlite` queries against a
//! mutex-guarded connection) and `routes/rooms.rs` (row-to-struct mapping
//! style). SQLite serializes writers on its own, so "the same transaction"
//! in §4.3 is satisfied here by holding the connection mutex across the
//! read-check-write sequence rather than by an explicit `BEGIN`; a
//! Postgres-backed implementation of the same trait would use a real
//! transaction with `SELECT ... FOR UPDATE`.

use crate::db::Db;
use crate::errors::AppError;
use crate::models::{Share, ShareState, User};
use rusqlite::{params, OptionalExtension};

fn row_to_share(row: &rusqlite::Row) -> rusqlite::Result<Share> {
    Ok(Share {
        share_id: row.get(0)?,
        owner_user_id: row.get(1)?,
        storage_key: row.get(2)?,
        original_name: row.get(3)?,
        size_bytes: row.get(4)?,
        mime_type: row.get(5)?,
        password_hash: row.get(6)?,
        created_at: row.get(7)?,
        expires_at: row.get(8)?,
        download_count: row.get(9)?,
        state: row.get(10)?,
        version: row.get(11)?,
    })
}

const SHARE_COLUMNS: &str = "id, owner_user_id, storage_key, original_name, size_bytes, \
     mime_type, password_hash, created_at, expires_at, download_count, state, version";

impl Db {
    pub fn upsert_user(&self, id: &str, email: &str, display_name: &str) -> Result<User, AppError> {
        let conn = self.conn();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO users (id, email, display_name, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(email) DO UPDATE SET display_name = excluded.display_name",
            params![id, email, display_name, &now],
        )?;
        conn.query_row(
            "SELECT id, email, display_name, created_at FROM users WHERE email = ?1",
            params![email],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    display_name: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .map_err(AppError::from)
    }

    /// Allocate a new `pending_upload` share. `share_id` must be fresh —
    /// collision on insert is a fatal misconfiguration of the id generator
    /// (§4.3) and surfaces as `AppError::Internal`.
    #[allow(clippy::too_many_arguments)]
    pub fn create_share_pending(
        &self,
        share_id: &str,
        owner_user_id: Option<&str>,
        storage_key: &str,
        original_name: &str,
        size_bytes: i64,
        mime_type: &str,
        password_hash: Option<&str>,
        created_at: &str,
        expires_at: &str,
    ) -> Result<Share, AppError> {
        let conn = self.conn();
        let inserted = conn.execute(
            "INSERT INTO shares (id, owner_user_id, storage_key, original_name, size_bytes, \
             mime_type, password_hash, created_at, expires_at, download_count, state, version) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, 0)",
            params![
                share_id,
                owner_user_id,
                storage_key,
                original_name,
                size_bytes,
                mime_type,
                password_hash,
                created_at,
                expires_at,
                ShareState::PendingUpload.as_str(),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                tracing::error!(share_id, "share id collision on insert — id generator misconfigured");
                return Err(AppError::Internal);
            }
            Err(e) => return Err(e.into()),
        }
        self.get_share_by_id_locked(&conn, share_id)?.ok_or(AppError::Internal)
    }

    /// Transition `pending_upload -> available`. Fails with `InvalidState`
    /// if the share isn't currently `pending_upload`.
    pub fn mark_share_available(&self, share_id: &str) -> Result<Share, AppError> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE shares SET state = ?1, version = version + 1 \
             WHERE id = ?2 AND state = ?3",
            params![
                ShareState::Available.as_str(),
                share_id,
                ShareState::PendingUpload.as_str(),
            ],
        )?;
        if updated == 0 {
            return Err(AppError::InvalidState(format!(
                "share {share_id} is not pending_upload"
            )));
        }
        self.get_share_by_id_locked(&conn, share_id)?.ok_or(AppError::NotFound)
    }

    pub fn get_share_by_id(&self, share_id: &str) -> Result<Option<Share>, AppError> {
        let conn = self.conn();
        self.get_share_by_id_locked(&conn, share_id)
    }

    fn get_share_by_id_locked(
        &self,
        conn: &rusqlite::Connection,
        share_id: &str,
    ) -> Result<Option<Share>, AppError> {
        conn.query_row(
            &format!("SELECT {SHARE_COLUMNS} FROM shares WHERE id = ?1"),
            params![share_id],
            row_to_share,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn list_shares_by_owner(&self, owner_user_id: &str) -> Result<Vec<Share>, AppError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SHARE_COLUMNS} FROM shares WHERE owner_user_id = ?1 \
             AND state != ?2 ORDER BY created_at DESC"
        ))?;
        let rows = stmt
            .query_map(params![owner_user_id, ShareState::Deleted.as_str()], row_to_share)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Atomically verify `expires_at > now` and `state == available` and
    /// bump `download_count` in one statement, closing the §4.4 race
    /// between the sweeper and a concurrent download issuance. Returns the
    /// updated share, or `None` if the guard failed (caller maps this to
    /// `expired`/`gone` as appropriate).
    pub fn increment_download_count(&self, share_id: &str, now: &str) -> Result<Option<Share>, AppError> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE shares SET download_count = download_count + 1, version = version + 1 \
             WHERE id = ?1 AND state = ?2 AND expires_at > ?3",
            params![share_id, ShareState::Available.as_str(), now],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        self.get_share_by_id_locked(&conn, share_id)
    }

    pub fn set_password_hash(&self, share_id: &str, hash: &str) -> Result<(), AppError> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE shares SET password_hash = ?1, version = version + 1 WHERE id = ?2",
            params![hash, share_id],
        )?;
        if updated == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Select a bounded batch of shares eligible for the expiry sweep
    /// (§4.4 step 1) and transition them to `expired` in the same
    /// statement, so two sweeper instances racing on the same row each see
    /// at most one of them succeed (no `FOR UPDATE SKIP LOCKED` in SQLite,
    /// but the single-writer guarantee gives the same effect).
    pub fn sweep_select_and_expire(
        &self,
        now: &str,
        grace_cutoff: &str,
        batch_size: usize,
    ) -> Result<Vec<Share>, AppError> {
        let conn = self.conn();
        let ids: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT id FROM shares WHERE state IN (?1, ?2) AND expires_at <= ?3 \
                 ORDER BY expires_at ASC LIMIT ?4",
            )?;
            stmt.query_map(
                params![
                    ShareState::PendingUpload.as_str(),
                    ShareState::Available.as_str(),
                    grace_cutoff,
                    batch_size as i64
                ],
                |row| row.get(0),
            )?
            .filter_map(|r| r.ok())
            .collect()
        };

        let mut expired = Vec::with_capacity(ids.len());
        for id in ids {
            let rows = conn.execute(
                "UPDATE shares SET state = ?1, version = version + 1 \
                 WHERE id = ?2 AND state IN (?3, ?4) AND expires_at <= ?5",
                params![
                    ShareState::Expired.as_str(),
                    &id,
                    ShareState::PendingUpload.as_str(),
                    ShareState::Available.as_str(),
                    grace_cutoff,
                ],
            )?;
            if rows == 1
                && let Some(share) = self.get_share_by_id_locked(&conn, &id)?
            {
                expired.push(share);
            }
        }
        let _ = now;
        Ok(expired)
    }

    pub fn transition_to_deleted(&self, share_id: &str) -> Result<(), AppError> {
        let conn = self.conn();
        conn.execute(
            "UPDATE shares SET state = ?1, version = version + 1 WHERE id = ?2",
            params![ShareState::Deleted.as_str(), share_id],
        )?;
        Ok(())
    }

    /// Owner-initiated revoke: `available|pending_upload -> deleted`
    /// directly (§4.2 `revoke`), skipping the `expired` intermediate state
    /// since this is an explicit action, not a timeout.
    pub fn revoke_share(&self, share_id: &str, caller: &str) -> Result<Share, AppError> {
        let conn = self.conn();
        let share = self.get_share_by_id_locked(&conn, share_id)?.ok_or(AppError::NotFound)?;
        match &share.owner_user_id {
            Some(owner) if owner == caller => {}
            _ => return Err(AppError::Forbidden),
        }
        if share.state == ShareState::Deleted.as_str() {
            return Err(AppError::InvalidState("share already deleted".into()));
        }
        conn.execute(
            "UPDATE shares SET state = ?1, version = version + 1 WHERE id = ?2",
            params![ShareState::Deleted.as_str(), share_id],
        )?;
        self.get_share_by_id_locked(&conn, share_id)?.ok_or(AppError::Internal)
    }

    /// Hard-delete `deleted` rows older than the retention window (§4.4
    /// step 3). A `None` window means retention is disabled (delete
    /// immediately on next sweep).
    pub fn hard_delete_expired_retention(&self, cutoff: Option<&str>) -> Result<usize, AppError> {
        let conn = self.conn();
        let n = match cutoff {
            Some(cutoff) => conn.execute(
                "DELETE FROM shares WHERE state = ?1 AND expires_at <= ?2",
                params![ShareState::Deleted.as_str(), cutoff],
            )?,
            None => conn.execute(
                "DELETE FROM shares WHERE state = ?1",
                params![ShareState::Deleted.as_str()],
            )?,
        };
        Ok(n)
    }

    pub fn hard_delete(&self, share_id: &str) -> Result<(), AppError> {
        let conn = self.conn();
        conn.execute("DELETE FROM shares WHERE id = ?1", params![share_id])?;
        Ok(())
    }

    pub fn append_download_event(&self, share_id: &str, requester_hash: &str) -> Result<(), AppError> {
        let conn = self.conn();
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO download_events (id, share_id, at, requester_hash) VALUES (?1, ?2, ?3, ?4)",
            params![id, share_id, now, requester_hash],
        )?;
        Ok(())
    }

    pub fn total_storage_bytes_for_owner(&self, owner_user_id: &str) -> Result<i64, AppError> {
        let conn = self.conn();
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM shares WHERE owner_user_id = ?1 \
             AND state IN (?2, ?3)",
            params![owner_user_id, ShareState::PendingUpload.as_str(), ShareState::Available.as_str()],
            |r| r.get(0),
        )?;
        Ok(total)
    }

    pub fn inflight_upload_count_for_owner(&self, owner_user_id: &str) -> Result<i64, AppError> {
        let conn = self.conn();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM shares WHERE owner_user_id = ?1 AND state = ?2",
            params![owner_user_id, ShareState::PendingUpload.as_str()],
            |r| r.get(0),
        )?;
        Ok(n)
    }
}
