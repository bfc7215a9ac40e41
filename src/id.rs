//! Session identifier generation and hashing
//!
//! The raw identifier travels in the cookie. The store only ever sees the
//! hashed form, salted with the server secret, so a leaked store dump cannot
//! be replayed as cookies.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Bytes of entropy in a generated identifier
pub const ID_BYTES: usize = 32;

/// Draw a fresh random identifier, base64url encoded without padding
pub fn generate_id() -> String {
    let mut buf = [0u8; ID_BYTES];
    rand::rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Derive the store key for a raw identifier
pub fn hash_id(raw_id: &str, secret: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_id.as_bytes());
    hasher.update(secret);
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
