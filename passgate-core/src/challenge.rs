//! Challenge entropy sources.

use crate::error::{CeremonyError, Result};

/// Source of challenge bytes.
///
/// Implementations must be thread-safe (`Send + Sync`) and must never
/// return the same bytes twice.
pub trait ChallengeSource: Send + Sync {
    /// Produce `len` bytes of fresh randomness.
    fn generate(&self, len: usize) -> Result<Vec<u8>>;

    /// Identifier for logs.
    fn source_id(&self) -> &'static str;
}

/// Operating-system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsChallengeSource;

impl ChallengeSource for OsChallengeSource {
    fn generate(&self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        getrandom::fill(&mut buf).map_err(|e| CeremonyError::Entropy(e.to_string()))?;
        Ok(buf)
    }

    fn source_id(&self) -> &'static str {
        "os"
    }
}
