use filedrop_core::signaling::registry::{PeerHandle, Registry, RegistryError};
use tokio::sync::mpsc;

fn peer_handle(id: &str) -> (PeerHandle, mpsc::Receiver<rocket_ws::Message>) {
    let (tx, rx) = mpsc::channel(16);
    let (closer, _closer_rx) = mpsc::channel(1);
    (
        PeerHandle {
            peer_id: id.to_string(),
            sender: tx,
            closer,
            device_name: None,
            joined_at: String::new(),
        },
        rx,
    )
}

// S5: room membership stays consistent across join/leave/disconnect, and
// both the per-room and global room caps are enforced.
#[test]
fn join_returns_existing_members_and_leave_cleans_up_empty_room() {
    let registry = Registry::new(8, 100);
    let (a, _rx_a) = peer_handle("a");
    let (b, _rx_b) = peer_handle("b");
    registry.register_peer(a);
    registry.register_peer(b);

    let existing = registry.join("a", "room-1").unwrap();
    assert!(existing.is_empty());

    let existing = registry.join("b", "room-1").unwrap();
    assert_eq!(existing, vec!["a".to_string()]);

    assert_eq!(registry.room_count(), 1);
    let mut members = registry.members("room-1");
    members.sort();
    assert_eq!(members, vec!["a".to_string(), "b".to_string()]);

    registry.leave("a", "room-1");
    assert_eq!(registry.members("room-1"), vec!["b".to_string()]);

    registry.leave("b", "room-1");
    assert_eq!(registry.room_count(), 0, "empty room must be pruned");
}

#[test]
fn room_full_is_rejected_past_room_cap() {
    let registry = Registry::new(2, 100);
    for id in ["a", "b"] {
        let (handle, _rx) = peer_handle(id);
        registry.register_peer(handle);
        registry.join(id, "room-1").unwrap();
    }

    let (c, _rx_c) = peer_handle("c");
    registry.register_peer(c);
    let err = registry.join("c", "room-1").unwrap_err();
    assert!(matches!(err, RegistryError::RoomFull));
}

#[test]
fn rejoining_the_same_room_does_not_count_against_its_own_cap() {
    let registry = Registry::new(1, 100);
    let (a, _rx) = peer_handle("a");
    registry.register_peer(a);
    registry.join("a", "room-1").unwrap();
    // Re-joining while already a member must not be treated as a new
    // occupant competing for the last slot.
    registry.join("a", "room-1").unwrap();
}

#[test]
fn too_many_concurrent_rooms_is_rejected() {
    let registry = Registry::new(8, 1);
    let (a, _rx_a) = peer_handle("a");
    registry.register_peer(a);
    registry.join("a", "room-1").unwrap();

    let (b, _rx_b) = peer_handle("b");
    registry.register_peer(b);
    let err = registry.join("b", "room-2").unwrap_err();
    assert!(matches!(err, RegistryError::TooManyRooms));
}

#[test]
fn remove_peer_leaves_every_joined_room_and_reports_them() {
    let registry = Registry::new(8, 100);
    let (a, _rx_a) = peer_handle("a");
    registry.register_peer(a);
    registry.join("a", "room-1").unwrap();
    registry.join("a", "room-2").unwrap();

    let mut left = registry.remove_peer("a");
    left.sort();
    assert_eq!(left, vec!["room-1".to_string(), "room-2".to_string()]);
    assert_eq!(registry.room_count(), 0);
    assert!(registry.peer_handle("a").is_none());
}
