// Route module decomposition — each domain area in its own file.
// Shared request guards live here; route functions in submodules.

mod object_store_stub;
mod rooms;
mod shares;
mod signaling;
mod system;
mod upload;

pub use object_store_stub::{object_store_get, object_store_put};
pub use rooms::room_snapshot;
pub use shares::{download_share, get_share, get_share_alias, list_my_shares, revoke_share};
pub use signaling::signaling_endpoint;
pub use system::{health, metrics, not_found, too_many_requests};
pub use upload::{finalize_upload, issue_upload};

use crate::config::AppConfig;
use crate::rate_limit::Principal;
use crate::session;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use std::sync::Arc;

/// Client IP, preferring `X-Forwarded-For` (behind a reverse proxy) and
/// falling back to the peer address Rocket observed directly. Used as the
/// admission controller's anonymous identity key (§4.5).
pub struct ClientIp(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let ip = req
            .headers()
            .get_one("X-Forwarded-For")
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .or_else(|| req.remote().map(|r| r.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string());
        Outcome::Success(ClientIp(ip))
    }
}

/// The resolved caller identity for this request, always present — an
/// invalid or missing session cookie resolves to `Principal::Anonymous`
/// rather than rejecting the request (§5.3). Routes that require
/// authentication check the variant themselves and return
/// `AppError::Unauthenticated`.
pub struct CallerPrincipal(pub Principal);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CallerPrincipal {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = match req.rocket().state::<Arc<AppConfig>>() {
            Some(c) => c,
            None => return Outcome::Success(CallerPrincipal(Principal::Anonymous)),
        };
        let principal = req
            .cookies()
            .get(&config.session_cookie_name)
            .and_then(|c| session::verify(&config.session_secret, c.value()))
            .map(Principal::User)
            .unwrap_or(Principal::Anonymous);
        Outcome::Success(CallerPrincipal(principal))
    }
}

impl CallerPrincipal {
    pub fn user_id(&self) -> Option<&str> {
        match &self.0 {
            Principal::User(id) => Some(id.as_str()),
            Principal::Anonymous => None,
        }
    }
}

/// Forwards with 401 unless the caller carries a valid session — for
/// owner-only routes (`GET /files`, `DELETE /files/{share_id}`).
pub struct AuthenticatedUser(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match CallerPrincipal::from_request(req).await {
            Outcome::Success(CallerPrincipal(Principal::User(id))) => Outcome::Success(AuthenticatedUser(id)),
            _ => Outcome::Forward(Status::Unauthorized),
        }
    }
}
