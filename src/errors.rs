//! Crate-wide error taxonomy and its HTTP mapping.
//!
//! Generalizes the teacher's hand-rolled `Responder` impls in
//! `rate_limit.rs` (one bespoke struct per status code) into a single
//! `AppError` enum so every route returns `Result<T, AppError>` instead of
//! ad hoc `(Status, Json<Value>)` tuples.

use rocket::http::{Header, Status};
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::Request;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum AppError {
    #[error("{0}")]
    ValidationFailed(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("invalid state transition: {0}")]
    InvalidState(String),
    #[error("share has expired")]
    Expired,
    #[error("no longer available")]
    Gone,
    #[error("object exceeds the configured size limit")]
    Oversize,
    #[error("unsupported media type")]
    UnsupportedMedia,
    #[error("password required")]
    PasswordRequired,
    #[error("incorrect password")]
    PasswordIncorrect,
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64, limit: usize },
    #[error("unknown peer")]
    UnknownPeer,
    #[error("target session is in a different room")]
    CrossRoomForbidden,
    #[error("frame too large")]
    FrameTooLarge,
    #[error("peer send buffer exhausted")]
    SendBufferExhausted,
    #[error("upstream dependency unavailable")]
    Unavailable,
    #[error("internal error")]
    Internal,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationFailed(_) => "validation_failed",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Forbidden => "forbidden",
            AppError::NotFound => "not_found",
            AppError::InvalidState(_) => "invalid_state",
            AppError::Expired => "expired",
            AppError::Gone => "gone",
            AppError::Oversize => "oversize",
            AppError::UnsupportedMedia => "unsupported_media",
            AppError::PasswordRequired => "password_required",
            AppError::PasswordIncorrect => "password_incorrect",
            AppError::QuotaExceeded => "quota_exceeded",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::UnknownPeer => "unknown_peer",
            AppError::CrossRoomForbidden => "cross_room_forbidden",
            AppError::FrameTooLarge => "frame_too_large",
            AppError::SendBufferExhausted => "send_buffer_exhausted",
            AppError::Unavailable => "unavailable",
            AppError::Internal => "internal",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            AppError::ValidationFailed(_) => Status::BadRequest,
            AppError::Unauthenticated => Status::Unauthorized,
            AppError::Forbidden => Status::Forbidden,
            AppError::NotFound => Status::NotFound,
            AppError::InvalidState(_) => Status::Conflict,
            AppError::Expired | AppError::Gone => Status::Gone,
            AppError::Oversize => Status::PayloadTooLarge,
            AppError::UnsupportedMedia => Status::UnsupportedMediaType,
            AppError::PasswordRequired | AppError::PasswordIncorrect => {
                Status::new(423) // Locked — reused per spec §6 for password-gated access
            }
            AppError::QuotaExceeded => Status::Forbidden,
            AppError::RateLimited { .. } => Status::TooManyRequests,
            AppError::UnknownPeer | AppError::CrossRoomForbidden => Status::BadRequest,
            AppError::FrameTooLarge => Status::PayloadTooLarge,
            AppError::SendBufferExhausted => Status::ServiceUnavailable,
            AppError::Unavailable => Status::ServiceUnavailable,
            AppError::Internal => Status::InternalServerError,
        }
    }

    /// Expired/deleted/never-existed shares must be indistinguishable to the
    /// caller (§7 user-visible behavior). Route handlers call this before
    /// rendering a `not_found`/`gone` error so brute-forcing share ids can't
    /// be used to enumerate which ones ever existed.
    pub fn uniform_gone_message(&self) -> &'static str {
        "no longer available"
    }
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let message = match &self {
            AppError::NotFound | AppError::Gone | AppError::Expired => {
                self.uniform_gone_message().to_string()
            }
            other => other.to_string(),
        };

        let body = Json(serde_json::json!({
            "error": { "code": self.code(), "message": message }
        }));

        let mut builder = Response::build_from(body.respond_to(req)?);
        builder.status(self.status());

        if let AppError::RateLimited { retry_after_secs, limit } = &self {
            builder
                .header(Header::new("Retry-After", retry_after_secs.to_string()))
                .header(Header::new("X-RateLimit-Limit", limit.to_string()))
                .header(Header::new("X-RateLimit-Remaining", "0"));
        }

        builder.ok()
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        tracing::error!(error = %e, "repository error");
        AppError::Internal
    }
}
