//! Base64 helpers used at the record boundary.
//!
//! Binary fields (digests, tokens, DER blobs) are persisted and exchanged as
//! standard base64 strings. The `serde_b64` modules plug into
//! `#[serde(with = ...)]`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Errors produced while decoding base64 payloads.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("invalid base64 in {field}: {reason}")]
    InvalidBase64 { field: &'static str, reason: String },
    #[error("{field} must be {expected} bytes, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Encode bytes as standard base64.
pub fn encode_b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a standard base64 string, naming the field on failure.
pub fn decode_b64(field: &'static str, text: &str) -> Result<Vec<u8>, EncodingError> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| EncodingError::InvalidBase64 {
            field,
            reason: e.to_string(),
        })
}

/// Decode a base64 string that must hold exactly `N` bytes.
pub fn decode_b64_array<const N: usize>(
    field: &'static str,
    text: &str,
) -> Result<[u8; N], EncodingError> {
    let bytes = decode_b64(field, text)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| EncodingError::InvalidLength {
            field,
            expected: N,
            actual: bytes.len(),
        })
}

/// `#[serde(with = "serde_b64::bytes")]` for `Vec<u8>` fields.
pub mod serde_b64 {
    pub mod bytes {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&STANDARD.encode(value))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
            let text = String::deserialize(deserializer)?;
            STANDARD.decode(text).map_err(serde::de::Error::custom)
        }
    }

    /// `#[serde(with = "serde_b64::array32")]` for `[u8; 32]` fields.
    pub mod array32 {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&STANDARD.encode(value))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
            let text = String::deserialize(deserializer)?;
            let bytes = STANDARD.decode(text).map_err(serde::de::Error::custom)?;
            bytes.as_slice().try_into().map_err(|_| {
                serde::de::Error::invalid_length(bytes.len(), &"32 bytes")
            })
        }
    }
}
