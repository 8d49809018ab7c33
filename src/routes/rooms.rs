use crate::rate_limit::{AdmissionController, Tier};
use crate::signaling::Registry;
use rocket::serde::json::Json;
use rocket::{get, State};
use std::sync::Arc;

use super::{CallerPrincipal, ClientIp};

/// Read-only occupancy snapshot of a signaling room (SPEC_FULL.md
/// supplement): how many peers are currently negotiating P2P transfer
/// for a given room id, without exposing peer identities.
#[get("/rooms/<room_id>")]
pub async fn room_snapshot(
    registry: &State<Arc<Registry>>,
    admission: &State<AdmissionController>,
    caller: CallerPrincipal,
    ip: ClientIp,
    room_id: &str,
) -> Result<Json<serde_json::Value>, crate::errors::AppError> {
    admission.check(Tier::Api, &caller.0, &ip.0).await?;
    let members = registry.members(room_id);
    Ok(Json(serde_json::json!({
        "room_id": room_id,
        "peer_count": members.len(),
    })))
}
