//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use passgate_core::{
    ConfigError, CredentialStore, MemoryCredentialStore, NativeVerifier, Orchestrator,
    OsChallengeSource,
};

use crate::config::Config;
use crate::session::SessionLocks;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Ceremony orchestrator (verifier, credential store and challenge source)
    pub orchestrator: Arc<Orchestrator>,
    /// Per-session locks serializing ceremony steps
    pub locks: Arc<SessionLocks>,
}

impl AppState {
    /// Build the orchestrator for `config` on top of `store`.
    pub fn from_config(config: &Config, store: Arc<dyn CredentialStore>) -> Result<Self, ConfigError> {
        let orchestrator = Orchestrator::new(
            config.ceremony_config()?,
            Arc::new(NativeVerifier::new()),
            store,
            Arc::new(OsChallengeSource),
        );
        tracing::debug!(?orchestrator, "Ceremony orchestrator configured");

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            locks: Arc::new(SessionLocks::new()),
        })
    }

    /// State backed by an in-memory credential store (development and tests)
    pub fn in_memory(config: &Config) -> Result<Self, ConfigError> {
        Self::from_config(config, Arc::new(MemoryCredentialStore::new()))
    }
}
