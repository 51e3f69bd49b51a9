//! Small shared helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in seconds
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Truncated BLAKE3 digest for logging challenges and tokens without leaking them
pub fn hash_for_log(value: &str) -> String {
    let hash = blake3::hash(value.as_bytes());
    hex::encode(&hash.as_bytes()[..8])
}

/// Unguessable token: 32 random bytes, hex encoded
pub fn generate_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}
