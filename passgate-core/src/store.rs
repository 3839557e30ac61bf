//! Credential Store collaborator.
//!
//! Records are keyed by the user handle issued at registration, which is
//! also what a resident credential reports back during authentication.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::StoreError;

/// A registered credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// User handle (raw bytes).
    #[serde(with = "codec::serde_bytes")]
    pub id: Vec<u8>,
    pub name: String,
    pub display_name: String,
    /// Credential id as reported by the authenticator (base64url).
    pub credential_id: String,
    /// COSE_Key encoded public key.
    #[serde(with = "codec::serde_bytes")]
    pub public_key: Vec<u8>,
    pub counter: u32,
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("id", &codec::encode(&self.id))
            .field("name", &self.name)
            .field("credential_id", &self.credential_id)
            .field("public_key_len", &self.public_key.len())
            .field("counter", &self.counter)
            .finish()
    }
}

/// Persistence for registered credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a newly registered credential, replacing any previous record
    /// for the same user handle.
    async fn save(&self, record: CredentialRecord) -> Result<(), StoreError>;

    /// Load by user handle; `StoreError::NotFound` when unknown.
    async fn load(&self, id: &[u8]) -> Result<CredentialRecord, StoreError>;

    /// Move the stored counter from `expected` to `counter`.
    ///
    /// Returns `Ok(false)` without writing when the stored counter is no
    /// longer `expected`, i.e. another assertion got there first.
    async fn update_counter(
        &self,
        id: &[u8],
        expected: u32,
        counter: u32,
    ) -> Result<bool, StoreError>;

    /// Backend liveness (always Ok for memory).
    async fn health(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Whether records survive a restart.
    fn is_persistent(&self) -> bool {
        false
    }
}

/// In-memory store for development and tests.
#[derive(Default)]
pub struct MemoryCredentialStore {
    records: DashMap<Vec<u8>, CredentialRecord>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl std::fmt::Debug for MemoryCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCredentialStore")
            .field("records", &self.records.len())
            .finish()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn save(&self, record: CredentialRecord) -> Result<(), StoreError> {
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn load(&self, id: &[u8]) -> Result<CredentialRecord, StoreError> {
        self.records
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound)
    }

    async fn update_counter(
        &self,
        id: &[u8],
        expected: u32,
        counter: u32,
    ) -> Result<bool, StoreError> {
        // The shard write lock makes compare and swap one step
        let mut entry = self.records.get_mut(id).ok_or(StoreError::NotFound)?;
        if entry.counter != expected {
            return Ok(false);
        }
        entry.counter = counter;
        Ok(true)
    }
}
