//! Wire protocol for the signaling hub: tagged JSON envelopes keyed on
//! `type`, exchanged over the `GET /signaling` WebSocket (§5). An unknown
//! `type` — or a frame that fails to parse as one of these variants at
//! all — maps to `AppError::ValidationFailed` rather than silently
//! dropping the frame.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    JoinRoom {
        room_id: String,
        #[serde(default)]
        device_name: Option<String>,
    },
    LeaveRoom { room_id: String },
    WebrtcOffer { room_id: String, to_peer_id: String, sdp: String },
    WebrtcAnswer { room_id: String, to_peer_id: String, sdp: String },
    IceCandidate { room_id: String, to_peer_id: String, candidate: String },
    Ping,
}

/// A room member as reported to other peers (§3 Peer session model).
#[derive(Debug, Serialize, Clone)]
pub struct PeerInfo {
    pub peer_id: String,
    pub device_name: Option<String>,
    pub joined_at: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame<'a> {
    Joined { peer_id: &'a str, room_id: &'a str, peers: &'a [PeerInfo] },
    PeerJoined {
        room_id: &'a str,
        peer_id: &'a str,
        device_name: Option<&'a str>,
        joined_at: &'a str,
    },
    PeerLeft { room_id: &'a str, peer_id: &'a str },
    WebrtcOffer { room_id: &'a str, from_peer_id: &'a str, sdp: &'a str },
    WebrtcAnswer { room_id: &'a str, from_peer_id: &'a str, sdp: &'a str },
    IceCandidate { room_id: &'a str, from_peer_id: &'a str, candidate: &'a str },
    Pong,
    Error { code: &'a str, message: &'a str },
}

impl<'a> ServerFrame<'a> {
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","code":"internal","message":"failed to encode frame"}"#.to_string()
        })
    }
}
