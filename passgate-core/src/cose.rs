//! COSE signature algorithm identifiers negotiated during registration.
//!
//! Identifiers follow the IANA COSE Algorithms registry. The set is closed:
//! unknown identifiers are rejected at configuration time rather than being
//! passed through to authenticators.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Signature algorithms a relying party may offer in `pubKeyCredParams`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum CoseAlgorithm {
    /// ECDSA w/ SHA-256 over P-256
    ES256,
    /// EdDSA (Ed25519)
    EdDSA,
    /// ECDSA w/ SHA-384 over P-384
    ES384,
    /// ECDSA w/ SHA-512 over P-521
    ES512,
    /// RSASSA-PSS w/ SHA-256
    PS256,
    /// RSASSA-PSS w/ SHA-384
    PS384,
    /// RSASSA-PSS w/ SHA-512
    PS512,
    /// RSASSA-PKCS1-v1_5 w/ SHA-256
    RS256,
}

/// Algorithms offered when the relying party does not override them.
///
/// RS256 stays in the list for legacy Windows Hello authenticators.
pub const DEFAULT_ALGORITHMS: [CoseAlgorithm; 2] = [CoseAlgorithm::ES256, CoseAlgorithm::RS256];

impl CoseAlgorithm {
    pub const ALL: [CoseAlgorithm; 8] = [
        Self::ES256,
        Self::EdDSA,
        Self::ES384,
        Self::ES512,
        Self::PS256,
        Self::PS384,
        Self::PS512,
        Self::RS256,
    ];

    /// The registered COSE identifier.
    pub const fn id(self) -> i64 {
        match self {
            Self::ES256 => -7,
            Self::EdDSA => -8,
            Self::ES384 => -35,
            Self::ES512 => -36,
            Self::PS256 => -37,
            Self::PS384 => -38,
            Self::PS512 => -39,
            Self::RS256 => -257,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::ES256 => "ES256",
            Self::EdDSA => "EdDSA",
            Self::ES384 => "ES384",
            Self::ES512 => "ES512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
            Self::RS256 => "RS256",
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.id() == id)
    }

    /// RS256 is accepted for compatibility but not recommended.
    pub const fn is_recommended(self) -> bool {
        !matches!(self, Self::RS256)
    }
}

impl fmt::Display for CoseAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.id())
    }
}

/// Parses either a registry name (case-insensitive) or the integer identifier.
impl FromStr for CoseAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(id) = trimmed.parse::<i64>() {
            return Self::from_id(id).ok_or_else(|| ConfigError::UnknownAlgorithm(s.to_string()));
        }
        Self::ALL
            .into_iter()
            .find(|alg| alg.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ConfigError::UnknownAlgorithm(s.to_string()))
    }
}

impl TryFrom<i64> for CoseAlgorithm {
    type Error = ConfigError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        Self::from_id(id).ok_or_else(|| ConfigError::UnknownAlgorithm(id.to_string()))
    }
}

impl From<CoseAlgorithm> for i64 {
    fn from(alg: CoseAlgorithm) -> Self {
        alg.id()
    }
}
