//! Signed session identifiers
//!
//! When signing keys are configured the cookie carries
//! `raw_id + "." + base64url(hmac_sha256(raw_id, key))` (no padding).
//! New cookies are always signed with the first key, while every configured
//! key is accepted on the way in, so a retiring key keeps working until the
//! cookies it signed expire.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::SessionError;

type HmacSha256 = Hmac<Sha256>;

/// Separator between the identifier and its digest
pub const SEPARATOR: char = '.';

/// HMAC-SHA256 digest of `value` under `key`, base64url encoded without padding
pub fn sign(value: &str, key: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(value.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

/// Check `digest` against every key in turn.
///
/// The comparison is done by the MAC itself, in constant time.
pub fn verify(value: &str, digest: &str, keys: &[Vec<u8>]) -> bool {
    let Ok(expected) = URL_SAFE_NO_PAD.decode(digest) else {
        return false;
    };

    keys.iter().any(|key| {
        let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
        mac.update(value.as_bytes());
        mac.verify_slice(&expected).is_ok()
    })
}

/// How identifiers are protected inside the cookie
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Signer {
    /// The cookie carries the bare identifier
    Disabled,
    /// The cookie carries `identifier.digest`; the first key signs
    Hmac { keys: Vec<Vec<u8>> },
}

impl Signer {
    /// Build a signer from a key list, an empty list disables signing
    pub fn new(keys: Vec<Vec<u8>>) -> Self {
        if keys.is_empty() {
            Signer::Disabled
        } else {
            Signer::Hmac { keys }
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Signer::Hmac { .. })
    }

    /// Produce the cookie value carrying `raw_id`
    pub fn encode(&self, raw_id: &str) -> String {
        match self {
            Signer::Disabled => raw_id.to_string(),
            Signer::Hmac { keys } => match keys.first() {
                Some(key) => format!("{}{}{}", raw_id, SEPARATOR, sign(raw_id, key)),
                None => raw_id.to_string(),
            },
        }
    }

    /// Recover the raw identifier from a cookie value
    pub fn decode<'a>(&self, value: &'a str) -> Result<&'a str, SessionError> {
        match self {
            Signer::Disabled => Ok(value),
            Signer::Hmac { keys } => {
                // digests are base64url, so the last separator is the split point
                let (raw_id, digest) = value
                    .rsplit_once(SEPARATOR)
                    .ok_or(SessionError::InvalidSignature)?;
                if raw_id.is_empty() || !verify(raw_id, digest, keys) {
                    return Err(SessionError::InvalidSignature);
                }
                Ok(raw_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key = b"keyboard cat".to_vec();
        let digest = sign("test-session-id", &key);

        assert!(!digest.contains('='));
        assert!(verify("test-session-id", &digest, &[key]));
    }

    #[test]
    fn test_invalid_signature() {
        let digest = sign("test-session-id", b"keyboard cat");
        assert!(!verify("test-session-id", &digest, &[b"wrong secret".to_vec()]));
        assert!(!verify("other-id", &digest, &[b"keyboard cat".to_vec()]));
        assert!(!verify("test-session-id", "not base64!", &[b"keyboard cat".to_vec()]));
    }

    #[test]
    fn test_known_vector() {
        // HMAC-SHA256("my session id", "secret"); the standard and url-safe
        // alphabets agree on this digest
        assert_eq!(
            sign("my session id", b"secret"),
            "Jytwl6nuMV42lj6Ldd7aa4sboVs87ZnnCfYLCAm7OrU"
        );
    }

    #[test]
    fn test_key_rotation() {
        let k1 = b"key1".to_vec();
        let k2 = b"key2".to_vec();

        let old = Signer::new(vec![k1.clone()]);
        let rotated = Signer::new(vec![k2.clone(), k1]);
        let retired = Signer::new(vec![k2]);

        let cookie = old.encode("abc");
        assert_eq!(rotated.decode(&cookie).ok(), Some("abc"));
        assert!(matches!(
            retired.decode(&cookie),
            Err(SessionError::InvalidSignature)
        ));

        // new cookies are signed with the primary key only
        let fresh = rotated.encode("abc");
        assert_eq!(retired.decode(&fresh).ok(), Some("abc"));
    }

    #[test]
    fn test_malformed_values() {
        let signer = Signer::new(vec![b"key".to_vec()]);
        assert!(signer.decode("no-separator").is_err());
        assert!(signer.decode(".digest").is_err());
        assert!(signer.decode("").is_err());
    }

    #[test]
    fn test_disabled_passthrough() {
        let signer = Signer::new(vec![]);
        assert!(!signer.is_enabled());
        assert_eq!(signer.encode("raw"), "raw");
        assert_eq!(signer.decode("raw.with.dots").ok(), Some("raw.with.dots"));
    }
}
