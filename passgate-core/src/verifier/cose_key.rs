//! COSE_Key decoding and signature checks for the supported key types.

use ciborium::Value;
use ed25519_dalek::Verifier as _;
use p256::ecdsa::signature::Verifier as _;

use crate::cose::CoseAlgorithm;
use crate::error::VerificationError;

// COSE_Key labels (RFC 9052 §7, RFC 9053 §7)
const LABEL_KTY: i64 = 1;
const LABEL_ALG: i64 = 3;
const LABEL_CRV: i64 = -1;
const LABEL_X: i64 = -2;
const LABEL_Y: i64 = -3;

const KTY_OKP: i64 = 1;
const KTY_EC2: i64 = 2;
const CRV_P256: i64 = 1;
const CRV_ED25519: i64 = 6;

/// A credential public key this crate can verify with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoseKey {
    /// ES256: uncompressed P-256 point.
    P256 { x: [u8; 32], y: [u8; 32] },
    /// EdDSA over Ed25519.
    Ed25519 { x: [u8; 32] },
}

impl CoseKey {
    /// Decode a COSE_Key, rejecting key types or algorithms without a
    /// verification path here.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, VerificationError> {
        let value: Value = ciborium::from_reader(bytes)
            .map_err(|e| VerificationError::new(format!("malformed COSE key: {e}")))?;
        let map = value
            .as_map()
            .ok_or_else(|| VerificationError::new("COSE key is not a map"))?;

        let alg = int_label(map, LABEL_ALG)?;
        let alg = CoseAlgorithm::from_id(alg)
            .ok_or_else(|| VerificationError::new(format!("unknown COSE algorithm {alg}")))?;
        let kty = int_label(map, LABEL_KTY)?;

        match (alg, kty) {
            (CoseAlgorithm::ES256, KTY_EC2) => {
                if int_label(map, LABEL_CRV)? != CRV_P256 {
                    return Err(VerificationError::new("ES256 key is not on P-256"));
                }
                Ok(Self::P256 {
                    x: coordinate(map, LABEL_X)?,
                    y: coordinate(map, LABEL_Y)?,
                })
            }
            (CoseAlgorithm::EdDSA, KTY_OKP) => {
                if int_label(map, LABEL_CRV)? != CRV_ED25519 {
                    return Err(VerificationError::new("EdDSA key is not Ed25519"));
                }
                Ok(Self::Ed25519 {
                    x: coordinate(map, LABEL_X)?,
                })
            }
            (alg, kty) => Err(VerificationError::new(format!(
                "unsupported credential key {} (kty {kty})",
                alg.name()
            ))),
        }
    }

    pub fn algorithm(&self) -> CoseAlgorithm {
        match self {
            Self::P256 { .. } => CoseAlgorithm::ES256,
            Self::Ed25519 { .. } => CoseAlgorithm::EdDSA,
        }
    }

    /// Check `signature` over `message`. ES256 signatures are DER encoded,
    /// EdDSA signatures are the raw 64 bytes.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), VerificationError> {
        match self {
            Self::P256 { x, y } => {
                let point = p256::EncodedPoint::from_affine_coordinates(
                    p256::FieldBytes::from_slice(x),
                    p256::FieldBytes::from_slice(y),
                    false,
                );
                let key = p256::ecdsa::VerifyingKey::from_encoded_point(&point)
                    .map_err(|_| VerificationError::new("P-256 point not on curve"))?;
                let sig = p256::ecdsa::Signature::from_der(signature)
                    .map_err(|_| VerificationError::new("malformed ES256 signature"))?;
                key.verify(message, &sig)
                    .map_err(|_| VerificationError::new("ES256 signature mismatch"))
            }
            Self::Ed25519 { x } => {
                let key = ed25519_dalek::VerifyingKey::from_bytes(x)
                    .map_err(|_| VerificationError::new("invalid Ed25519 public key"))?;
                let sig = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|_| VerificationError::new("malformed EdDSA signature"))?;
                key.verify(message, &sig)
                    .map_err(|_| VerificationError::new("EdDSA signature mismatch"))
            }
        }
    }
}

fn label<'a>(map: &'a [(Value, Value)], key: i64) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.as_integer().map(i128::from) == Some(i128::from(key)))
        .map(|(_, v)| v)
}

fn int_label(map: &[(Value, Value)], key: i64) -> Result<i64, VerificationError> {
    label(map, key)
        .and_then(Value::as_integer)
        .and_then(|i| i64::try_from(i).ok())
        .ok_or_else(|| VerificationError::new(format!("COSE key label {key} missing or not an integer")))
}

fn coordinate(map: &[(Value, Value)], key: i64) -> Result<[u8; 32], VerificationError> {
    label(map, key)
        .and_then(Value::as_bytes)
        .and_then(|b| <[u8; 32]>::try_from(b.as_slice()).ok())
        .ok_or_else(|| VerificationError::new(format!("COSE key label {key} is not a 32 byte string")))
}
