//! Passgate Core - WebAuthn ceremony orchestration
//!
//! This crate holds the protocol logic between a relying party's server and
//! a client authenticator: challenges are issued and bound to a session,
//! binary credential fields are canonically encoded for JSON transport, and
//! signature counters are enforced to detect cloned authenticators.
//!
//! # Features
//!
//! - `orchestrator` (default): session state machine, challenge source,
//!   credential store trait and in-memory store
//! - `native-verifier` (default): ES256/EdDSA verifier for `none` and
//!   self-`packed` attestation
//! - `softtoken`: in-process ES256 authenticator for tests and the CLI
//!
//! The codec, option/credential documents and the client ceremony driver
//! are always available, so browser builds can use
//! `default-features = false`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use passgate_core::{
//!     CeremonyConfig, MemoryCredentialStore, NativeVerifier, Orchestrator,
//!     OsChallengeSource, SessionCeremonyState,
//! };
//!
//! # fn example() -> passgate_core::Result<()> {
//! let config = CeremonyConfig::builder("example.com").build()?;
//! let orchestrator = Orchestrator::new(
//!     config,
//!     Arc::new(NativeVerifier::new()),
//!     Arc::new(MemoryCredentialStore::new()),
//!     Arc::new(OsChallengeSource),
//! );
//!
//! // One state per HTTP session
//! let mut session = SessionCeremonyState::new();
//! let options = orchestrator.offer_registration(&mut session, "alice", None)?;
//! println!("{}", serde_json::to_string(&options).unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod cose;
pub mod documents;
pub mod driver;
pub mod error;

#[cfg(feature = "orchestrator")]
pub mod challenge;
#[cfg(feature = "orchestrator")]
pub mod orchestrator;
#[cfg(feature = "orchestrator")]
pub mod session;
#[cfg(feature = "orchestrator")]
pub mod store;
#[cfg(feature = "orchestrator")]
pub mod verifier;

#[cfg(feature = "softtoken")]
pub mod softtoken;

// Re-export main types for convenience
pub use config::{AttestationPreference, CeremonyConfig, UserVerificationRequirement};
pub use cose::{CoseAlgorithm, DEFAULT_ALGORITHMS};
pub use documents::{
    AuthenticationOptions, CeremonyResult, CredentialDocument, OptionsDocument,
    PublicKeyCredential, RegistrationOptions,
};
pub use driver::{
    build_options, package_credential, CeremonyDriver, CeremonyTransport, Endpoint, Method,
    PlatformAssertionRequest, PlatformAuthenticator, PlatformCreationRequest, PlatformCredential,
    PlatformRequest,
};
pub use error::{CeremonyError, CodecError, ConfigError, Result, StoreError, VerificationError};

#[cfg(feature = "orchestrator")]
pub use challenge::{ChallengeSource, OsChallengeSource};
#[cfg(feature = "orchestrator")]
pub use orchestrator::Orchestrator;
#[cfg(feature = "orchestrator")]
pub use session::{CeremonyKind, CeremonyPhase, SessionCeremonyState};
#[cfg(feature = "orchestrator")]
pub use store::{CredentialRecord, CredentialStore, MemoryCredentialStore};
#[cfg(feature = "orchestrator")]
pub use verifier::Verifier;

#[cfg(feature = "native-verifier")]
pub use verifier::NativeVerifier;

#[cfg(feature = "softtoken")]
pub use softtoken::SoftToken;
