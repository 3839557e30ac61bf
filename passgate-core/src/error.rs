use thiserror::Error;

/// Transport encoding failures (base64url fields on the wire).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed base64url in {field}: {reason}")]
    MalformedEncoding { field: &'static str, reason: String },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

/// Relying-party configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("relyingPartyId is a required option")]
    MissingRelyingPartyId,

    #[error("Invalid origin URL: {0}")]
    InvalidOrigin(String),

    #[error("Unknown COSE algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("At least one acceptable algorithm is required")]
    NoAlgorithms,

    #[error("Challenge length {0} is below the 16 byte minimum")]
    ChallengeTooShort(usize),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Credential Store collaborator errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Credential not found")]
    NotFound,

    #[error("Store connection error: {0}")]
    Connection(String),

    #[error("Store query error: {0}")]
    Query(String),

    #[error("Store serialization error: {0}")]
    Serialization(String),
}

/// Rejection reported by the Verifier collaborator.
///
/// The message is for logs only; it never reaches the client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct VerificationError(pub String);

impl VerificationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors terminating a ceremony attempt. None of them are retried; the
/// caller must request a fresh offer.
#[derive(Error, Debug)]
pub enum CeremonyError {
    #[error(transparent)]
    MalformedEncoding(#[from] CodecError),

    #[error("No pending challenge for this session")]
    NoPendingChallenge,

    #[error("Pending challenge has expired")]
    ChallengeExpired,

    #[error("Session has no complete user identity")]
    IncompleteIdentity,

    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Signature counter regression: stored={stored}, reported={reported}")]
    CounterRegression { stored: u32, reported: u32 },

    #[error("Unknown credential")]
    UnknownCredential,

    #[error("User cancelled the platform ceremony")]
    UserCancelled,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Credential store error: {0}")]
    Store(StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Entropy source error: {0}")]
    Entropy(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Platform authenticator error: {0}")]
    Platform(String),
}

impl From<StoreError> for CeremonyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::UnknownCredential,
            other => Self::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, CeremonyError>;
