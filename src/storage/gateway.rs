//! Object-storage gateway (§4.2): translates between share metadata and
//! the external object store through presigned URLs. Never streams file
//! bytes itself — the repository and the `ObjectStore` trait are its only
//! collaborators.

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::{IssueDownloadResponse, IssueUploadResponse, Share};
use crate::storage::object_store::ObjectStore;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use std::sync::Arc;

pub struct Gateway {
    pub db: Arc<crate::db::Db>,
    pub store: Arc<dyn ObjectStore>,
    pub config: AppConfig,
}

/// Strip path separators and anything outside a conservative safe charset,
/// then bound the length (§4.2 key derivation).
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .filter(|c| !c.is_control())
        .collect();
    let trimmed = cleaned.trim();
    let bounded: String = trimmed.chars().take(200).collect();
    if bounded.is_empty() { "file".to_string() } else { bounded }
}

fn derive_storage_key(share_id: &str, original_name: &str) -> String {
    format!("{}/{}", share_id, sanitize_filename(original_name))
}

fn mime_allowed(config: &AppConfig, mime: &str) -> bool {
    if config.blocked_mime_types.iter().any(|b| b == mime) {
        return false;
    }
    if config.allowed_mime_prefixes.is_empty() {
        return true;
    }
    config.allowed_mime_prefixes.iter().any(|p| mime.starts_with(p.as_str()))
}

impl Gateway {
    pub fn new(db: Arc<crate::db::Db>, store: Arc<dyn ObjectStore>, config: AppConfig) -> Self {
        Self { db, store, config }
    }

    pub async fn issue_upload(
        &self,
        owner: Option<&str>,
        original_name: &str,
        size_bytes: i64,
        mime_type: &str,
        expiry_secs: i64,
        password: Option<&str>,
    ) -> Result<IssueUploadResponse, AppError> {
        if original_name.trim().is_empty() {
            return Err(AppError::ValidationFailed("original_name must not be empty".into()));
        }
        if size_bytes < 0 {
            return Err(AppError::ValidationFailed("size_bytes must be non-negative".into()));
        }
        if size_bytes > self.config.max_object_size_bytes {
            return Err(AppError::Oversize);
        }
        if !mime_allowed(&self.config, mime_type) {
            return Err(AppError::UnsupportedMedia);
        }
        if !self.config.allowed_expiry_secs.contains(&expiry_secs) {
            return Err(AppError::ValidationFailed("expiry_secs is not an allowed duration".into()));
        }
        if owner.is_none() && !self.config.anonymous_shares_allowed {
            return Err(AppError::Unauthenticated);
        }

        if let Some(owner_id) = owner {
            let used = self.db.total_storage_bytes_for_owner(owner_id)?;
            if used + size_bytes > self.config.per_user_storage_quota_bytes {
                return Err(AppError::QuotaExceeded);
            }
            let inflight = self.db.inflight_upload_count_for_owner(owner_id)?;
            if inflight as usize >= self.config.per_user_inflight_upload_cap {
                return Err(AppError::QuotaExceeded);
            }
        }

        let share_id = generate_share_id();
        let storage_key = derive_storage_key(&share_id, original_name);
        let now = chrono::Utc::now();
        let expires_at = now + chrono::Duration::seconds(expiry_secs);

        let password_hash = match password {
            Some(p) if !p.is_empty() => Some(hash_password(p)?),
            _ => None,
        };

        self.db.create_share_pending(
            &share_id,
            owner,
            &storage_key,
            original_name,
            size_bytes,
            mime_type,
            password_hash.as_deref(),
            &now.to_rfc3339(),
            &expires_at.to_rfc3339(),
        )?;

        let presigned = self
            .store
            .presign_put(&storage_key, mime_type, size_bytes, self.config.upload_url_ttl)
            .await?;

        Ok(IssueUploadResponse {
            share_id,
            upload_url: presigned.url,
            upload_method: presigned.method.to_string(),
            upload_headers: presigned.headers,
            expires_at: (now + chrono::Duration::from_std(self.config.upload_url_ttl).unwrap())
                .to_rfc3339(),
        })
    }

    /// Idempotent: calling again after success is a no-op returning the
    /// current state (§4.2).
    pub async fn finalize_upload(&self, share_id: &str, actual_size: i64) -> Result<Share, AppError> {
        let share = self.db.get_share_by_id(share_id)?.ok_or(AppError::NotFound)?;
        if share.state == crate::models::ShareState::Available.as_str() {
            return Ok(share);
        }
        if share.state != crate::models::ShareState::PendingUpload.as_str() {
            return Err(AppError::InvalidState(format!("share {share_id} is {}", share.state)));
        }

        let exists = self.store.exists(&share.storage_key).await?;
        let size_ok = match self.store.head(&share.storage_key).await? {
            Some(meta) => meta.size_bytes == actual_size && actual_size == share.size_bytes,
            None => false,
        };

        if !exists || !size_ok {
            self.db.transition_to_deleted(share_id)?;
            let _ = self.store.delete(&share.storage_key).await;
            return Err(AppError::ValidationFailed("upload_not_found".into()));
        }

        self.db.mark_share_available(share_id)
    }

    pub async fn issue_download(
        &self,
        share_id: &str,
        password: Option<&str>,
        requester_ip_hash: &str,
    ) -> Result<IssueDownloadResponse, AppError> {
        let share = self.db.get_share_by_id(share_id)?.ok_or(AppError::NotFound)?;

        let now = chrono::Utc::now();
        let expires_at = chrono::DateTime::parse_from_rfc3339(&share.expires_at)
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or(now);
        if now >= expires_at {
            return Err(AppError::Expired);
        }
        if share.state != crate::models::ShareState::Available.as_str() {
            return Err(AppError::Gone);
        }

        if let Some(hash) = &share.password_hash {
            match password {
                None => return Err(AppError::PasswordRequired),
                Some(p) => {
                    if !verify_password(p, hash) {
                        return Err(AppError::PasswordIncorrect);
                    }
                }
            }
        }

        // Atomically re-check expiry/state and bump download_count, closing
        // the race between this check and the sweeper (§4.4, §8 invariant 2).
        let updated = self
            .db
            .increment_download_count(share_id, &now.to_rfc3339())?
            .ok_or(AppError::Expired)?;

        self.db.append_download_event(share_id, requester_ip_hash)?;

        let presigned = self
            .store
            .presign_get(&share.storage_key, &share.original_name, self.config.download_url_ttl)
            .await?;

        Ok(IssueDownloadResponse {
            download_url: presigned.url,
            filename: updated.original_name,
            size_bytes: updated.size_bytes,
            expires_at: (now + chrono::Duration::from_std(self.config.download_url_ttl).unwrap())
                .to_rfc3339(),
        })
    }

    pub async fn revoke(&self, share_id: &str, caller: &str) -> Result<(), AppError> {
        let share = self.db.revoke_share(share_id, caller)?;
        self.store.delete(&share.storage_key).await?;
        Ok(())
    }
}

fn generate_share_id() -> String {
    // >= 128 bits of entropy, URL-safe (§3). UUIDv4 carries 122 bits of
    // randomness; pad with a second random u32 encoded alongside it to
    // clear the 128-bit floor with room to spare.
    use rand::RngCore;
    let mut extra = [0u8; 4];
    OsRng.fill_bytes(&mut extra);
    format!("{}{}", uuid::Uuid::new_v4().simple(), hex::encode(extra))
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            tracing::error!(error = %e, "argon2 hash failed");
            AppError::Internal
        })
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}
