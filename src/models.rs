use serde::{Deserialize, Serialize};

/// A principal resolved from the identity provider. Upserted on first
/// successful sign-in; never deleted implicitly by the core.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub created_at: String,
}

/// Lifecycle state of a [`Share`]. Transitions are enforced by the
/// repository, never by callers mutating rows directly.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShareState {
    PendingUpload,
    Available,
    Expired,
    Deleted,
}

impl ShareState {
    pub fn as_str(self) -> &'static str {
        match self {
            ShareState::PendingUpload => "pending_upload",
            ShareState::Available => "available",
            ShareState::Expired => "expired",
            ShareState::Deleted => "deleted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending_upload" => Some(ShareState::PendingUpload),
            "available" => Some(ShareState::Available),
            "expired" => Some(ShareState::Expired),
            "deleted" => Some(ShareState::Deleted),
            _ => None,
        }
    }
}

/// The unit of cloud exchange. See §3 of the control-plane spec for the
/// full invariant list; the repository is the only writer of this shape.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Share {
    pub share_id: String,
    pub owner_user_id: Option<String>,
    pub storage_key: String,
    pub original_name: String,
    pub size_bytes: i64,
    pub mime_type: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: String,
    pub expires_at: String,
    pub download_count: i64,
    pub state: String,
    pub version: i64,
}

impl Share {
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Metadata-only view returned by `GET /share/{share_id}` — never carries
/// a presigned URL or the password hash.
#[derive(Debug, Serialize, Deserialize)]
pub struct ShareView {
    pub share_id: String,
    pub original_name: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub expires_at: String,
    pub has_password: bool,
    pub state: String,
}

impl From<&Share> for ShareView {
    fn from(s: &Share) -> Self {
        ShareView {
            share_id: s.share_id.clone(),
            original_name: s.original_name.clone(),
            size_bytes: s.size_bytes,
            mime_type: s.mime_type.clone(),
            expires_at: s.expires_at.clone(),
            has_password: s.has_password(),
            state: s.state.clone(),
        }
    }
}

/// Append-only analytics row; retention policy is independent of Share's.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DownloadEvent {
    pub id: String,
    pub share_id: String,
    pub at: String,
    pub requester_hash: String,
}

// --- Request/response bodies ----------------------------------------------

#[derive(Debug, Deserialize)]
pub struct IssueUploadRequest {
    pub original_name: String,
    pub size_bytes: i64,
    pub mime_type: String,
    /// Requested lifetime in seconds; must be one of `AppConfig::allowed_expiry_secs`.
    pub expiry_secs: i64,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IssueUploadResponse {
    pub share_id: String,
    pub upload_url: String,
    pub upload_method: String,
    pub upload_headers: Vec<(String, String)>,
    pub expires_at: String,
}

#[derive(Debug, Deserialize)]
pub struct FinalizeUploadRequest {
    pub share_id: String,
    pub actual_size: i64,
}

#[derive(Debug, Serialize)]
pub struct FinalizeUploadResponse {
    pub share_id: String,
    pub state: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct DownloadRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IssueDownloadResponse {
    pub download_url: String,
    pub filename: String,
    pub size_bytes: i64,
    pub expires_at: String,
}

#[derive(Debug, Serialize)]
pub struct OwnedShareSummary {
    pub share_id: String,
    pub original_name: String,
    pub size_bytes: i64,
    pub created_at: String,
    pub expires_at: String,
    pub download_count: i64,
    pub state: String,
}

impl From<&Share> for OwnedShareSummary {
    fn from(s: &Share) -> Self {
        OwnedShareSummary {
            share_id: s.share_id.clone(),
            original_name: s.original_name.clone(),
            size_bytes: s.size_bytes,
            created_at: s.created_at.clone(),
            expires_at: s.expires_at.clone(),
            download_count: s.download_count,
            state: s.state.clone(),
        }
    }
}

#[derive(Debug, Serialize, Default)]
pub struct ListSharesResponse {
    pub shares: Vec<OwnedShareSummary>,
    pub count: usize,
}
