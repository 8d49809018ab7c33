//! Session cookie signing and verification (§5.3 principal resolution).
//! Reuses the HMAC-SHA256 stack the teacher already depends on for webhook
//! signature verification rather than pulling in a JWT crate for a cookie
//! that only ever needs to prove "this user id, not expired, not tampered".

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &[u8], user_id: &str, expires_at: i64) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(user_id.as_bytes());
    mac.update(b".");
    mac.update(expires_at.to_string().as_bytes());
    Some(mac)
}

pub fn sign(secret: &[u8], user_id: &str, ttl: std::time::Duration) -> String {
    let expires_at = (chrono::Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default()).timestamp();
    let tag = mac_for(secret, user_id, expires_at)
        .map(|m| hex::encode(m.finalize().into_bytes()))
        .unwrap_or_default();
    format!("{user_id}.{expires_at}.{tag}")
}

/// Returns the user id if the cookie's signature is valid and it has not
/// expired. Any malformed or tampered value resolves to anonymous rather
/// than erroring — callers treat a missing session the same as a bad one.
pub fn verify(secret: &[u8], cookie_value: &str) -> Option<String> {
    let mut parts = cookie_value.splitn(3, '.');
    let user_id = parts.next()?;
    let expires_at: i64 = parts.next()?.parse().ok()?;
    let tag_hex = parts.next()?;

    if chrono::Utc::now().timestamp() > expires_at {
        return None;
    }

    let mac = mac_for(secret, user_id, expires_at)?;
    let tag = hex::decode(tag_hex).ok()?;
    mac.verify_slice(&tag).ok()?;
    Some(user_id.to_string())
}
