//! Per-connection signaling task (§5): the WebRTC-offer/answer/ICE relay
//! that lets two peers discover each other and negotiate a direct P2P
//! transfer, with the cloud path as fallback. One task per upgraded
//! connection, state machine `connecting -> joined -> leaving -> closed`.
//!
//! Grounded on the teacher's broadcast-based real-time delivery
//! (`events::EventBus`) for the "fan a message out to interested
//! listeners" shape, but replaces the single `tokio::sync::broadcast`
//! channel with a per-peer bounded `mpsc` so one slow peer can't stall
//! delivery to the others (§5 backpressure).

use crate::config::AppConfig;
use crate::signaling::protocol::{ClientFrame, PeerInfo, ServerFrame};
use crate::signaling::registry::{PeerHandle, Registry, RegistryError};
use futures::{SinkExt, StreamExt};
use rocket_ws::Message;
use rocket_ws::stream::DuplexStream;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Drives one WebSocket connection end to end. Returns once the socket
/// closes, errors, or the idle timeout fires — never panics on a
/// malformed frame, which is reported back to the sender instead.
pub async fn handle_connection(mut stream: DuplexStream, registry: Arc<Registry>, config: Arc<AppConfig>) {
    let peer_id = Uuid::new_v4().to_string();
    let queue_capacity = (config.max_send_queue_bytes / config.max_frame_bytes.max(1)).max(8);
    let (tx, mut rx) = mpsc::channel::<Message>(queue_capacity);
    let (close_tx, mut close_rx) = mpsc::channel::<()>(1);

    registry.register_peer(PeerHandle {
        peer_id: peer_id.clone(),
        sender: tx.clone(),
        closer: close_tx,
        device_name: None,
        joined_at: chrono::Utc::now().to_rfc3339(),
    });

    let mut joined_room: Option<String> = None;
    let mut last_activity = Instant::now();
    let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
    heartbeat.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            incoming = stream.next() => {
                match incoming {
                    None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer_id, error = %e, "signaling socket error");
                        break;
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(Message::Ping(payload))) => {
                        last_activity = Instant::now();
                        if stream.send(Message::Pong(payload)).await.is_err() { break; }
                    }
                    Some(Ok(Message::Text(text))) => {
                        last_activity = Instant::now();
                        if text.len() > config.max_frame_bytes {
                            send_error(&mut stream, "frame_too_large", "frame exceeds the configured size limit").await;
                            continue;
                        }
                        if !handle_text_frame(&text, &peer_id, &mut joined_room, &registry, &mut stream).await {
                            break;
                        }
                    }
                    Some(Ok(_)) => {} // binary/other frames are not part of this protocol
                }
            }
            outgoing = rx.recv() => {
                match outgoing {
                    Some(msg) => {
                        if stream.send(msg).await.is_err() { break; }
                    }
                    None => break,
                }
            }
            _ = close_rx.recv() => {
                tracing::debug!(peer_id, "peer force-closed: send buffer exhausted");
                break;
            }
            _ = heartbeat.tick() => {
                if last_activity.elapsed() > config.idle_timeout {
                    tracing::debug!(peer_id, "signaling connection idle timeout");
                    break;
                }
                if stream.send(Message::Ping(Vec::new())).await.is_err() { break; }
            }
        }
    }

    if let Some(room_id) = &joined_room {
        registry.leave(&peer_id, room_id);
        broadcast_peer_left(&registry, room_id, &peer_id);
    }
    registry.remove_peer(&peer_id);
}

/// Returns `false` if the connection should be torn down.
async fn handle_text_frame(
    text: &str,
    peer_id: &str,
    joined_room: &mut Option<String>,
    registry: &Registry,
    stream: &mut DuplexStream,
) -> bool {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(_) => {
            send_error(stream, "validation_failed", "unrecognized or malformed frame").await;
            return true;
        }
    };

    match frame {
        ClientFrame::JoinRoom { room_id, device_name } => {
            match registry.join(peer_id, &room_id) {
                Ok(existing) => {
                    *joined_room = Some(room_id.clone());
                    let joined_at = chrono::Utc::now().to_rfc3339();
                    registry.set_peer_info(peer_id, device_name.clone(), joined_at.clone());

                    let existing_info: Vec<PeerInfo> = existing
                        .iter()
                        .filter_map(|other| {
                            registry.peer_handle(other).map(|h| PeerInfo {
                                peer_id: h.peer_id,
                                device_name: h.device_name,
                                joined_at: h.joined_at,
                            })
                        })
                        .collect();

                    let frame = ServerFrame::Joined { peer_id, room_id: &room_id, peers: &existing_info };
                    if stream.send(Message::Text(frame.to_text())).await.is_err() {
                        return false;
                    }
                    for other in &existing {
                        if let Some(handle) = registry.peer_handle(other) {
                            let notice = ServerFrame::PeerJoined {
                                room_id: &room_id,
                                peer_id,
                                device_name: device_name.as_deref(),
                                joined_at: &joined_at,
                            };
                            let _ = handle.sender.try_send(Message::Text(notice.to_text()));
                        }
                    }
                }
                Err(RegistryError::RoomFull) => {
                    send_error(stream, "validation_failed", "room is at capacity").await;
                }
                Err(RegistryError::TooManyRooms) => {
                    send_error(stream, "unavailable", "too many concurrent rooms").await;
                }
            }
            true
        }
        ClientFrame::LeaveRoom { room_id } => {
            registry.leave(peer_id, &room_id);
            if joined_room.as_deref() == Some(room_id.as_str()) {
                *joined_room = None;
            }
            broadcast_peer_left(registry, &room_id, peer_id);
            true
        }
        ClientFrame::WebrtcOffer { room_id, to_peer_id, sdp } => {
            relay(
                registry, stream, joined_room, &room_id, peer_id, &to_peer_id,
                |room_id, from, sdp| ServerFrame::WebrtcOffer { room_id, from_peer_id: from, sdp }.to_text(),
                &sdp,
            ).await;
            true
        }
        ClientFrame::WebrtcAnswer { room_id, to_peer_id, sdp } => {
            relay(
                registry, stream, joined_room, &room_id, peer_id, &to_peer_id,
                |room_id, from, sdp| ServerFrame::WebrtcAnswer { room_id, from_peer_id: from, sdp }.to_text(),
                &sdp,
            ).await;
            true
        }
        ClientFrame::IceCandidate { room_id, to_peer_id, candidate } => {
            relay(
                registry, stream, joined_room, &room_id, peer_id, &to_peer_id,
                |room_id, from, candidate| ServerFrame::IceCandidate { room_id, from_peer_id: from, candidate }.to_text(),
                &candidate,
            ).await;
            true
        }
        ClientFrame::Ping => {
            let _ = stream.send(Message::Text(ServerFrame::Pong.to_text())).await;
            true
        }
    }
}

/// Shared relay logic for the three WebRTC negotiation messages: verify
/// both peers are in the named room, then forward to the target's queue
/// or report why delivery failed (§5 error taxonomy).
async fn relay(
    registry: &Registry,
    stream: &mut DuplexStream,
    joined_room: &Option<String>,
    room_id: &str,
    from_peer_id: &str,
    to_peer_id: &str,
    build: impl Fn(&str, &str, &str) -> String,
    payload: &str,
) {
    if joined_room.as_deref() != Some(room_id) {
        send_error(stream, "cross_room_forbidden", "sender has not joined this room").await;
        return;
    }
    let members = registry.members(room_id);
    if !members.iter().any(|m| m == to_peer_id) {
        // Distinguish "never heard of this session" from "that session is
        // real but joined to a different room" (§4.1 routing rules).
        if registry.peer_handle(to_peer_id).is_some() {
            send_error(stream, "cross_room_forbidden", "target peer is not in this room").await;
        } else {
            send_error(stream, "unknown_peer", "target peer is not connected").await;
        }
        return;
    }
    match registry.peer_handle(to_peer_id) {
        Some(handle) => {
            let text = build(room_id, from_peer_id, payload);
            if handle.sender.try_send(Message::Text(text)).is_err() {
                // §5: a peer whose queue is saturated gets force-closed, not
                // just silently skipped — the sender is told why.
                registry.force_close(to_peer_id);
                send_error(stream, "send_buffer_exhausted", "target peer's send queue is full").await;
            }
        }
        None => send_error(stream, "unknown_peer", "target peer is no longer connected").await,
    }
}

fn broadcast_peer_left(registry: &Registry, room_id: &str, peer_id: &str) {
    for other in registry.members(room_id) {
        if let Some(handle) = registry.peer_handle(&other) {
            let notice = ServerFrame::PeerLeft { room_id, peer_id };
            let _ = handle.sender.try_send(Message::Text(notice.to_text()));
        }
    }
}

async fn send_error(stream: &mut DuplexStream, code: &str, message: &str) {
    let frame = ServerFrame::Error { code, message };
    let _ = stream.send(Message::Text(frame.to_text())).await;
}
