//! Credential storage backends
//!
//! Challenges never touch storage: they live in the ceremony state inside
//! the session. Only registered credentials are persisted.
//!
//! If `DATABASE_URL` is not set, falls back to in-memory storage for
//! credentials (useful for development, but credentials will be lost on
//! restart).

mod postgres;

pub use postgres::PostgresCredentialStore;

use std::sync::Arc;

use passgate_core::{CredentialStore, MemoryCredentialStore, StoreError};

use crate::config::Config;

/// Select the credential store backend for this configuration.
pub async fn credential_store(config: &Config) -> Result<Arc<dyn CredentialStore>, StoreError> {
    match &config.database_url {
        Some(url) => {
            let store =
                PostgresCredentialStore::connect(url, config.database_max_connections).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set - using in-memory credential storage, credentials will be lost on restart!"
            );
            Ok(Arc::new(MemoryCredentialStore::new()))
        }
    }
}
