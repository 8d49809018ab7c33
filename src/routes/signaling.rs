use crate::config::AppConfig;
use crate::rate_limit::Principal;
use crate::signaling::{hub, Registry};
use rocket::http::Status;
use rocket::{get, State};
use rocket_ws::{Channel, WebSocket};
use std::sync::Arc;

use super::CallerPrincipal;

/// Upgrades to the signaling WebSocket (§5). Authorization is resolved the
/// same way the HTTP routes do, via `CallerPrincipal` off the session
/// cookie: an authenticated caller is always admitted, an anonymous one
/// only if `config.anonymous_p2p_allowed` permits it (§4.1 Authorization).
/// One `hub::handle_connection` task per connection; the registry and
/// config are cheap `Arc` clones into the channel closure.
#[get("/signaling")]
pub fn signaling_endpoint(
    ws: WebSocket,
    registry: &State<Arc<Registry>>,
    config: &State<Arc<AppConfig>>,
    caller: CallerPrincipal,
) -> Result<Channel<'static>, Status> {
    if matches!(caller.0, Principal::Anonymous) && !config.anonymous_p2p_allowed {
        return Err(Status::Unauthorized);
    }

    let registry = registry.inner().clone();
    let config = config.inner().clone();
    Ok(ws.channel(move |stream| {
        Box::pin(async move {
            hub::handle_connection(stream, registry, config).await;
            Ok(())
        })
    }))
}
