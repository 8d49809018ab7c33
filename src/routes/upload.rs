use crate::errors::AppError;
use crate::models::{FinalizeUploadRequest, FinalizeUploadResponse, IssueUploadRequest, IssueUploadResponse};
use crate::rate_limit::{AdmissionController, Principal, Tier};
use crate::storage::Gateway;
use rocket::serde::json::Json;
use rocket::{post, State};

use super::{CallerPrincipal, ClientIp};

#[post("/upload/presign", format = "json", data = "<body>")]
pub async fn issue_upload(
    gateway: &State<Gateway>,
    admission: &State<AdmissionController>,
    caller: CallerPrincipal,
    ip: ClientIp,
    body: Json<IssueUploadRequest>,
) -> Result<Json<IssueUploadResponse>, AppError> {
    admission.check(Tier::Upload, &caller.0, &ip.0).await?;

    let owner = match &caller.0 {
        Principal::User(id) => Some(id.as_str()),
        Principal::Anonymous => None,
    };

    let response = gateway
        .issue_upload(
            owner,
            &body.original_name,
            body.size_bytes,
            &body.mime_type,
            body.expiry_secs,
            body.password.as_deref(),
        )
        .await?;

    Ok(Json(response))
}

#[post("/upload/finalize", format = "json", data = "<body>")]
pub async fn finalize_upload(
    gateway: &State<Gateway>,
    admission: &State<AdmissionController>,
    caller: CallerPrincipal,
    ip: ClientIp,
    body: Json<FinalizeUploadRequest>,
) -> Result<Json<FinalizeUploadResponse>, AppError> {
    admission.check(Tier::Api, &caller.0, &ip.0).await?;

    let share = gateway.finalize_upload(&body.share_id, body.actual_size).await?;
    Ok(Json(FinalizeUploadResponse { share_id: share.share_id, state: share.state }))
}
