//! Peer/room registry backing the signaling hub (§5). Grounded on
//! `examples/other_examples/.../ws-rooms.rs`'s `RoomRegistry`: a forward
//! index (room -> members) plus a reverse index (peer -> rooms) kept
//! consistent under one lock ordering, generalized from raw connection
//! handles to `mpsc::Sender`-backed peer handles so a join/leave/broadcast
//! can actually deliver a frame instead of writing straight to a socket.

use rocket_ws::Message;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct PeerHandle {
    pub peer_id: String,
    pub sender: mpsc::Sender<Message>,
    /// Dedicated control channel the hub uses to force-close a peer whose
    /// `sender` queue is already full (§5: a saturated data queue must not
    /// block delivery of the close signal itself).
    pub closer: mpsc::Sender<()>,
    pub device_name: Option<String>,
    pub joined_at: String,
}

/// Lock ordering is always `rooms` then `peer_rooms` then `peers` — matches
/// the teacher's "rooms write, then conn_rooms write" discipline and
/// prevents deadlock when two tasks join/leave concurrently.
pub struct Registry {
    rooms: RwLock<HashMap<String, HashSet<String>>>,
    peer_rooms: RwLock<HashMap<String, HashSet<String>>>,
    peers: RwLock<HashMap<String, PeerHandle>>,
    room_cap: usize,
    max_rooms: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("room is at capacity")]
    RoomFull,
    #[error("too many concurrent rooms")]
    TooManyRooms,
}

impl Registry {
    pub fn new(room_cap: usize, max_rooms: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            peer_rooms: RwLock::new(HashMap::new()),
            peers: RwLock::new(HashMap::new()),
            room_cap,
            max_rooms,
        }
    }

    pub fn register_peer(&self, handle: PeerHandle) {
        self.peers.write().unwrap().insert(handle.peer_id.clone(), handle);
    }

    pub fn peer_handle(&self, peer_id: &str) -> Option<PeerHandle> {
        self.peers.read().unwrap().get(peer_id).cloned()
    }

    /// Records the `device_name`/`joined_at` carried on `join_room` (§3 Peer
    /// session model). Updates the handle already registered at connect
    /// time rather than re-inserting, so `peers` never needs a second index.
    pub fn set_peer_info(&self, peer_id: &str, device_name: Option<String>, joined_at: String) {
        if let Some(handle) = self.peers.write().unwrap().get_mut(peer_id) {
            handle.device_name = device_name;
            handle.joined_at = joined_at;
        }
    }

    /// Best-effort nudge to force-close a peer whose data queue is full.
    /// Safe to call even if the peer has already disconnected.
    pub fn force_close(&self, peer_id: &str) {
        if let Some(handle) = self.peers.read().unwrap().get(peer_id) {
            let _ = handle.closer.try_send(());
        }
    }

    /// Joins `peer_id` to `room_id`, enforcing the per-room and global room
    /// caps (§5 resource bounds). Returns the other members already present.
    pub fn join(&self, peer_id: &str, room_id: &str) -> Result<Vec<String>, RegistryError> {
        let mut rooms = self.rooms.write().unwrap();
        let mut peer_rooms = self.peer_rooms.write().unwrap();

        let is_new_room = !rooms.contains_key(room_id);
        if is_new_room && rooms.len() >= self.max_rooms {
            return Err(RegistryError::TooManyRooms);
        }

        let members = rooms.entry(room_id.to_string()).or_default();
        if members.len() >= self.room_cap && !members.contains(peer_id) {
            return Err(RegistryError::RoomFull);
        }

        let existing: Vec<String> = members.iter().filter(|m| *m != peer_id).cloned().collect();
        members.insert(peer_id.to_string());
        peer_rooms.entry(peer_id.to_string()).or_default().insert(room_id.to_string());

        Ok(existing)
    }

    pub fn leave(&self, peer_id: &str, room_id: &str) {
        let mut rooms = self.rooms.write().unwrap();
        let mut peer_rooms = self.peer_rooms.write().unwrap();

        if let Some(members) = rooms.get_mut(room_id) {
            members.remove(peer_id);
            if members.is_empty() {
                rooms.remove(room_id);
            }
        }
        if let Some(set) = peer_rooms.get_mut(peer_id) {
            set.remove(room_id);
            if set.is_empty() {
                peer_rooms.remove(peer_id);
            }
        }
    }

    /// Removes a disconnected peer from every room it had joined and drops
    /// its send handle. Called once, on connection teardown.
    pub fn remove_peer(&self, peer_id: &str) -> Vec<String> {
        let mut rooms = self.rooms.write().unwrap();
        let mut peer_rooms = self.peer_rooms.write().unwrap();
        self.peers.write().unwrap().remove(peer_id);

        let joined_rooms: Vec<String> = peer_rooms.remove(peer_id).map(|s| s.into_iter().collect()).unwrap_or_default();
        for room_id in &joined_rooms {
            if let Some(members) = rooms.get_mut(room_id) {
                members.remove(peer_id);
                if members.is_empty() {
                    rooms.remove(room_id);
                }
            }
        }
        joined_rooms
    }

    pub fn members(&self, room_id: &str) -> Vec<String> {
        self.rooms.read().unwrap().get(room_id).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().unwrap().len()
    }
}
