//! Session data codecs
//!
//! Stores keep encoded bytes rather than live values. The codec is the only
//! piece that knows the byte format.

use crate::error::SessionError;
use crate::session::SessionData;

/// Serializer for whole session mappings
pub trait Codec: Send + Sync + 'static {
    fn encode(&self, data: &SessionData) -> Result<Vec<u8>, SessionError>;

    /// Decoding zero bytes must yield an empty mapping
    fn decode(&self, bytes: &[u8]) -> Result<SessionData, SessionError>;
}

/// JSON codec backed by serde_json
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, data: &SessionData) -> Result<Vec<u8>, SessionError> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::to_vec(data)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<SessionData, SessionError> {
        if bytes.is_empty() {
            return Ok(SessionData::default());
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let codec = JsonCodec;
        let bytes = codec.encode(&SessionData::default()).unwrap();
        assert!(bytes.is_empty());
        assert!(codec.decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_roundtrip() {
        let codec = JsonCodec;
        let mut data = SessionData::default();
        data.set("user", "alice").unwrap();
        data.set("roles", vec!["admin", "dev"]).unwrap();

        let decoded = codec.decode(&codec.encode(&data).unwrap()).unwrap();
        assert_eq!(decoded, data);
        assert_eq!(decoded.get::<Vec<String>>("roles").unwrap(), vec!["admin", "dev"]);
    }

    #[test]
    fn test_invalid_bytes() {
        let err = JsonCodec.decode(b"invalid data").unwrap_err();
        assert!(matches!(err, SessionError::Encoding(_)));
    }
}
