use filedrop_core::session;
use filedrop_core::signaling::protocol::ClientFrame;
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    // A session cookie must verify back to the same user id it was signed
    // for, for any user id and any secret, as long as it hasn't expired.
    #[test]
    fn session_cookie_round_trips_for_any_user_id_and_secret(
        user_id in "[a-zA-Z0-9_-]{1,32}",
        secret in prop::collection::vec(any::<u8>(), 1..32),
    ) {
        let cookie = session::sign(&secret, &user_id, Duration::from_secs(3600));
        let verified = session::verify(&secret, &cookie);
        prop_assert_eq!(verified, Some(user_id));
    }

    // Tampering with any byte of a signed cookie's tag must never verify —
    // a forged session can never be mistaken for a legitimate one.
    #[test]
    fn session_cookie_rejects_any_single_byte_tag_tamper(
        user_id in "[a-zA-Z0-9_-]{1,16}",
        secret in prop::collection::vec(any::<u8>(), 8..32),
        tamper_index in 0usize..16,
    ) {
        let cookie = session::sign(&secret, &user_id, Duration::from_secs(3600));
        let mut parts: Vec<&str> = cookie.splitn(3, '.').collect();
        let mut tag_bytes = hex::decode(parts[2]).unwrap();
        let idx = tamper_index % tag_bytes.len();
        tag_bytes[idx] ^= 0xFF;
        let tampered_tag = hex::encode(tag_bytes);
        let tampered = format!("{}.{}.{}", parts[0], parts[1], tampered_tag);
        parts.clear();

        prop_assert_eq!(session::verify(&secret, &tampered), None);
    }

    // A cookie signed with ttl=0 is already expired and must never verify.
    #[test]
    fn session_cookie_signed_with_zero_ttl_never_verifies(
        user_id in "[a-zA-Z0-9_-]{1,16}",
        secret in prop::collection::vec(any::<u8>(), 1..32),
    ) {
        let cookie = session::sign(&secret, &user_id, Duration::from_secs(0));
        // The expiry timestamp equals "now" at signing time; by the time
        // verify() runs, real clock time has advanced past it.
        std::thread::sleep(Duration::from_millis(1100));
        prop_assert_eq!(session::verify(&secret, &cookie), None);
    }

    // Every ClientFrame the protocol defines must decode from the exact
    // JSON shape a conforming client would send, for arbitrary field values.
    #[test]
    fn join_room_frame_round_trips_through_json(room_id in "[a-zA-Z0-9_-]{1,64}") {
        let json = serde_json::json!({"type": "join_room", "room_id": room_id}).to_string();
        let frame: ClientFrame = serde_json::from_str(&json).unwrap();
        match frame {
            ClientFrame::JoinRoom { room_id: parsed, device_name } => {
                prop_assert_eq!(parsed, room_id);
                prop_assert_eq!(device_name, None);
            }
            _ => prop_assert!(false, "expected JoinRoom variant"),
        }
    }

    #[test]
    fn webrtc_offer_frame_round_trips_through_json(
        room_id in "[a-zA-Z0-9_-]{1,32}",
        to_peer_id in "[a-zA-Z0-9_-]{1,32}",
        sdp in ".{0,200}",
    ) {
        let json = serde_json::json!({
            "type": "webrtc_offer",
            "room_id": room_id,
            "to_peer_id": to_peer_id,
            "sdp": sdp,
        })
        .to_string();
        let frame: ClientFrame = serde_json::from_str(&json).unwrap();
        match frame {
            ClientFrame::WebrtcOffer { room_id: r, to_peer_id: t, sdp: s } => {
                prop_assert_eq!(r, room_id);
                prop_assert_eq!(t, to_peer_id);
                prop_assert_eq!(s, sdp);
            }
            _ => prop_assert!(false, "expected WebrtcOffer variant"),
        }
    }
}

#[test]
fn unknown_frame_type_fails_to_parse() {
    let json = r#"{"type":"self_destruct","payload":"nope"}"#;
    let result: Result<ClientFrame, _> = serde_json::from_str(json);
    assert!(result.is_err());
}
