//! Canonical base64url codec for binary fields crossing the JSON boundary.
//!
//! Challenges, user handles, credential ids and authenticator buffers are
//! carried as unpadded URL-safe base64. Decoding is strict: padding, the
//! standard alphabet and non-canonical trailing bits are all rejected, so
//! `encode(decode(s)) == s` holds for every accepted `s`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

use crate::error::CodecError;

/// Encode bytes for transport.
///
/// An empty buffer encodes to `None` so that absent fields stay absent on
/// the wire instead of turning into `""`.
pub fn encode(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        None
    } else {
        Some(URL_SAFE_NO_PAD.encode(bytes))
    }
}

/// Encode an optional buffer, passing absence through.
pub fn encode_opt(bytes: Option<&[u8]>) -> Option<String> {
    bytes.and_then(encode)
}

/// Decode a transport string back into bytes.
pub fn decode(encoded: &str) -> Result<Vec<u8>, CodecError> {
    decode_field("value", encoded)
}

/// Decode with the offending field name attached to the error.
pub fn decode_field(field: &'static str, encoded: &str) -> Result<Vec<u8>, CodecError> {
    URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| CodecError::MalformedEncoding {
            field,
            reason: e.to_string(),
        })
}

/// Decode an optional transport field.
pub fn decode_opt(field: &'static str, encoded: Option<&str>) -> Result<Option<Vec<u8>>, CodecError> {
    encoded.map(|s| decode_field(field, s)).transpose()
}

/// `#[serde(with = "...")]` adapter for required binary fields.
pub mod serde_bytes {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        URL_SAFE_NO_PAD.decode(encoded).map_err(D::Error::custom)
    }
}

/// `#[serde(with = "...")]` adapter for optional binary fields.
pub mod serde_bytes_opt {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes.as_deref().and_then(super::encode) {
            Some(encoded) => serializer.serialize_some(&encoded),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?;
        encoded
            .map(|s| super::decode(&s).map_err(D::Error::custom))
            .transpose()
    }
}
