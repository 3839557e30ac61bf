//! Relying Party configuration
//!
//! Resolved once when the orchestrator is constructed. Every option has a
//! documented default except the relying party id.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cose::{CoseAlgorithm, DEFAULT_ALGORITHMS};
use crate::error::ConfigError;

/// Smallest challenge the orchestrator will issue, in bytes.
pub const MIN_CHALLENGE_LEN: usize = 16;

/// Attestation conveyance requested from the authenticator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationPreference {
    #[default]
    None,
    Indirect,
    Direct,
    Enterprise,
}

impl AttestationPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Indirect => "indirect",
            Self::Direct => "direct",
            Self::Enterprise => "enterprise",
        }
    }
}

impl FromStr for AttestationPreference {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "indirect" => Ok(Self::Indirect),
            "direct" => Ok(Self::Direct),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(ConfigError::InvalidValue {
                key: "attestation",
                value: s.to_string(),
            }),
        }
    }
}

/// User verification requirement advertised in option documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationRequirement {
    Required,
    #[default]
    Preferred,
    Discouraged,
}

impl UserVerificationRequirement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Preferred => "preferred",
            Self::Discouraged => "discouraged",
        }
    }
}

impl FromStr for UserVerificationRequirement {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "required" => Ok(Self::Required),
            "preferred" => Ok(Self::Preferred),
            "discouraged" => Ok(Self::Discouraged),
            _ => Err(ConfigError::InvalidValue {
                key: "user_verification",
                value: s.to_string(),
            }),
        }
    }
}

/// Resolved relying-party configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct CeremonyConfig {
    relying_party_id: String,
    relying_party_name: String,
    origin: Url,
    attestation: AttestationPreference,
    algorithms: Vec<CoseAlgorithm>,
    require_resident_key: bool,
    user_verification: UserVerificationRequirement,
    timeout: Duration,
    challenge_ttl: Duration,
    challenge_len: usize,
}

impl CeremonyConfig {
    /// Start building a configuration for the given relying party id.
    pub fn builder(relying_party_id: impl Into<String>) -> CeremonyConfigBuilder {
        CeremonyConfigBuilder::new(relying_party_id)
    }

    pub fn relying_party_id(&self) -> &str {
        &self.relying_party_id
    }

    pub fn relying_party_name(&self) -> &str {
        &self.relying_party_name
    }

    /// Origin expected in client data, without a trailing slash.
    pub fn origin(&self) -> String {
        self.origin.origin().ascii_serialization()
    }

    pub fn attestation(&self) -> AttestationPreference {
        self.attestation
    }

    pub fn algorithms(&self) -> &[CoseAlgorithm] {
        &self.algorithms
    }

    pub fn require_resident_key(&self) -> bool {
        self.require_resident_key
    }

    pub fn user_verification(&self) -> UserVerificationRequirement {
        self.user_verification
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn challenge_ttl(&self) -> Duration {
        self.challenge_ttl
    }

    pub fn challenge_len(&self) -> usize {
        self.challenge_len
    }
}

impl fmt::Debug for CeremonyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CeremonyConfig")
            .field("rp_id", &self.relying_party_id)
            .field("origin", &self.origin())
            .field("algorithms", &self.algorithms)
            .field("challenge_ttl", &self.challenge_ttl)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CeremonyConfig`].
#[derive(Debug, Clone)]
pub struct CeremonyConfigBuilder {
    relying_party_id: String,
    relying_party_name: Option<String>,
    origin: Option<String>,
    attestation: AttestationPreference,
    algorithms: Vec<CoseAlgorithm>,
    require_resident_key: bool,
    user_verification: UserVerificationRequirement,
    timeout: Duration,
    challenge_ttl: Duration,
    challenge_len: usize,
}

impl CeremonyConfigBuilder {
    fn new(relying_party_id: impl Into<String>) -> Self {
        Self {
            relying_party_id: relying_party_id.into(),
            relying_party_name: None,
            origin: None,
            attestation: AttestationPreference::None,
            algorithms: DEFAULT_ALGORITHMS.to_vec(),
            require_resident_key: true,
            user_verification: UserVerificationRequirement::Preferred,
            timeout: Duration::from_millis(60_000),
            challenge_ttl: Duration::from_secs(300),
            challenge_len: 32,
        }
    }

    pub fn relying_party_name(mut self, name: impl Into<String>) -> Self {
        self.relying_party_name = Some(name.into());
        self
    }

    /// Override the expected origin (defaults to `https://{rp_id}`).
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn attestation(mut self, attestation: AttestationPreference) -> Self {
        self.attestation = attestation;
        self
    }

    pub fn algorithms(mut self, algorithms: impl IntoIterator<Item = CoseAlgorithm>) -> Self {
        self.algorithms = algorithms.into_iter().collect();
        self
    }

    pub fn require_resident_key(mut self, required: bool) -> Self {
        self.require_resident_key = required;
        self
    }

    pub fn user_verification(mut self, requirement: UserVerificationRequirement) -> Self {
        self.user_verification = requirement;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn challenge_ttl(mut self, ttl: Duration) -> Self {
        self.challenge_ttl = ttl;
        self
    }

    pub fn challenge_len(mut self, len: usize) -> Self {
        self.challenge_len = len;
        self
    }

    pub fn build(self) -> Result<CeremonyConfig, ConfigError> {
        let relying_party_id = self.relying_party_id.trim().to_string();
        if relying_party_id.is_empty() {
            return Err(ConfigError::MissingRelyingPartyId);
        }

        let origin_str = self
            .origin
            .unwrap_or_else(|| format!("https://{relying_party_id}"));
        let origin = Url::parse(&origin_str)
            .map_err(|e| ConfigError::InvalidOrigin(format!("{origin_str}: {e}")))?;
        if !matches!(origin.scheme(), "https" | "http") || origin.host_str().is_none() {
            return Err(ConfigError::InvalidOrigin(origin_str));
        }

        if self.algorithms.is_empty() {
            return Err(ConfigError::NoAlgorithms);
        }
        let mut algorithms = Vec::with_capacity(self.algorithms.len());
        for alg in self.algorithms {
            if !algorithms.contains(&alg) {
                algorithms.push(alg);
            }
        }

        if self.challenge_len < MIN_CHALLENGE_LEN {
            return Err(ConfigError::ChallengeTooShort(self.challenge_len));
        }
        if self.challenge_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "challenge_ttl",
                value: "0".into(),
            });
        }

        Ok(CeremonyConfig {
            relying_party_name: self
                .relying_party_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| relying_party_id.clone()),
            relying_party_id,
            origin,
            attestation: self.attestation,
            algorithms,
            require_resident_key: self.require_resident_key,
            user_verification: self.user_verification,
            timeout: self.timeout,
            challenge_ttl: self.challenge_ttl,
            challenge_len: self.challenge_len,
        })
    }
}
