//! Attestation/Assertion Verifier collaborator.
//!
//! The orchestrator never inspects authenticator bytes itself. It hands the
//! decoded credential plus what it expects to a [`Verifier`] and only looks
//! at the narrow outcome: the new public key and counter on registration,
//! the reported counter on authentication.
//!
//! [`NativeVerifier`] (feature `native-verifier`) is a self-contained
//! implementation covering `none`/self-`packed` attestation with ES256 and
//! EdDSA keys.

#[cfg(feature = "native-verifier")]
mod authdata;
#[cfg(feature = "native-verifier")]
mod cose_key;
#[cfg(feature = "native-verifier")]
mod native;

#[cfg(feature = "native-verifier")]
pub use authdata::{AttestedCredentialData, AuthenticatorData};
#[cfg(feature = "native-verifier")]
pub use cose_key::CoseKey;
#[cfg(feature = "native-verifier")]
pub use native::NativeVerifier;

use async_trait::async_trait;

use crate::config::UserVerificationRequirement;
use crate::cose::CoseAlgorithm;
use crate::documents::PublicKeyCredential;
use crate::error::VerificationError;

/// How strictly the user-verification flag is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserVerificationPolicy {
    /// User presence suffices; verification is accepted but not demanded.
    Either,
    /// The UV flag must be set.
    Required,
}

impl From<UserVerificationRequirement> for UserVerificationPolicy {
    fn from(requirement: UserVerificationRequirement) -> Self {
        match requirement {
            UserVerificationRequirement::Required => Self::Required,
            _ => Self::Either,
        }
    }
}

/// What a registration credential must match.
#[derive(Debug, Clone)]
pub struct AttestationExpectation {
    pub challenge: Vec<u8>,
    pub origin: String,
    pub rp_id: String,
    pub user_verification: UserVerificationPolicy,
    /// Algorithms offered in the registration options.
    pub algorithms: Vec<CoseAlgorithm>,
}

/// What an authentication credential must match.
#[derive(Debug, Clone)]
pub struct AssertionExpectation {
    pub challenge: Vec<u8>,
    pub origin: String,
    pub rp_id: String,
    pub user_verification: UserVerificationPolicy,
    pub user_handle: Vec<u8>,
    /// COSE_Key recorded at registration.
    pub public_key: Vec<u8>,
    pub previous_counter: u32,
}

/// Accepted registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationOutcome {
    /// Base64url credential id from the attested credential data.
    pub credential_id: String,
    /// COSE_Key encoded public key.
    pub public_key: Vec<u8>,
    pub counter: u32,
}

/// Accepted assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssertionOutcome {
    pub counter: u32,
}

/// Cryptographic verification of authenticator responses.
///
/// Implementations must be thread-safe (`Send + Sync`). Counter
/// monotonicity is enforced by the orchestrator, not the verifier.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify_attestation(
        &self,
        credential: &PublicKeyCredential,
        expectation: &AttestationExpectation,
    ) -> Result<AttestationOutcome, VerificationError>;

    async fn verify_assertion(
        &self,
        credential: &PublicKeyCredential,
        expectation: &AssertionExpectation,
    ) -> Result<AssertionOutcome, VerificationError>;
}
