use crate::db::Db;
use crate::errors::AppError;
use crate::models::{DownloadRequest, IssueDownloadResponse, ListSharesResponse, OwnedShareSummary, ShareView};
use crate::rate_limit::{AdmissionController, Tier};
use crate::storage::Gateway;
use rocket::serde::json::Json;
use rocket::{delete, get, post, State};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::{AuthenticatedUser, CallerPrincipal, ClientIp};

fn hash_ip(ip: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hex::encode(hasher.finalize())
}

#[get("/share/<share_id>")]
pub async fn get_share(
    db: &State<Arc<Db>>,
    admission: &State<AdmissionController>,
    caller: CallerPrincipal,
    ip: ClientIp,
    share_id: &str,
) -> Result<Json<ShareView>, AppError> {
    admission.check(Tier::Api, &caller.0, &ip.0).await?;
    let share = db.get_share_by_id(share_id)?.ok_or(AppError::NotFound)?;
    if share.state == crate::models::ShareState::Deleted.as_str() {
        return Err(AppError::NotFound);
    }
    Ok(Json(ShareView::from(&share)))
}

/// Alias of [`get_share`] mounted at `/files/{share_id}` for clients that
/// think in terms of files rather than shares (SPEC_FULL.md supplement).
#[get("/files/<share_id>")]
pub async fn get_share_alias(
    db: &State<Arc<Db>>,
    admission: &State<AdmissionController>,
    caller: CallerPrincipal,
    ip: ClientIp,
    share_id: &str,
) -> Result<Json<ShareView>, AppError> {
    get_share(db, admission, caller, ip, share_id).await
}

#[post("/share/<share_id>/download", format = "json", data = "<body>")]
pub async fn download_share(
    gateway: &State<Gateway>,
    admission: &State<AdmissionController>,
    caller: CallerPrincipal,
    ip: ClientIp,
    share_id: &str,
    body: Json<DownloadRequest>,
) -> Result<Json<IssueDownloadResponse>, AppError> {
    admission.check(Tier::Download, &caller.0, &ip.0).await?;
    if body.password.is_some() {
        // §7: password attempts get the stricter auth-tier ceiling too, to
        // deter brute-forcing a share's password via the download endpoint.
        admission.check(Tier::Auth, &caller.0, &ip.0).await?;
    }
    let requester_hash = hash_ip(&ip.0);
    let response = gateway.issue_download(share_id, body.password.as_deref(), &requester_hash).await?;
    Ok(Json(response))
}

#[get("/files")]
pub async fn list_my_shares(
    db: &State<Arc<Db>>,
    admission: &State<AdmissionController>,
    caller: CallerPrincipal,
    ip: ClientIp,
    user: AuthenticatedUser,
) -> Result<Json<ListSharesResponse>, AppError> {
    admission.check(Tier::Api, &caller.0, &ip.0).await?;
    let shares = db.list_shares_by_owner(&user.0)?;
    let shares: Vec<OwnedShareSummary> = shares.iter().map(OwnedShareSummary::from).collect();
    let count = shares.len();
    Ok(Json(ListSharesResponse { shares, count }))
}

#[delete("/files/<share_id>")]
pub async fn revoke_share(
    gateway: &State<Gateway>,
    admission: &State<AdmissionController>,
    caller: CallerPrincipal,
    ip: ClientIp,
    user: AuthenticatedUser,
    share_id: &str,
) -> Result<Json<serde_json::Value>, AppError> {
    admission.check(Tier::Api, &caller.0, &ip.0).await?;
    gateway.revoke(share_id, &user.0).await?;
    Ok(Json(serde_json::json!({"revoked": true})))
}
