//! Cookie session binding for ceremony state
//!
//! The [`SessionCeremonyState`] lives inside the `tower-sessions` record
//! under a single key. Steps on the same session are serialized: a handler
//! holds the per-session lock from load until the state has been written
//! back and saved, so two concurrent completions cannot both consume the
//! same challenge.

use std::sync::Arc;

use dashmap::DashMap;
use passgate_core::SessionCeremonyState;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tower_sessions::session::Id;
use tower_sessions::Session;

use crate::error::ApiError;

/// Session key holding the serialized ceremony state.
pub const CEREMONY_STATE_KEY: &str = "passgate.ceremony";

/// Per-session async locks, created on demand and dropped when idle.
#[derive(Default)]
pub struct SessionLocks {
    locks: DashMap<Id, Arc<Mutex<()>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    async fn acquire(&self, id: Id) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(id).or_default().clone();
        lock.lock_owned().await
    }

    fn release(&self, id: &Id) {
        self.locks.remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of sessions with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Ceremony state loaded from a session, held under the session lock.
pub struct CeremonySession {
    session: Session,
    state: SessionCeremonyState,
    locks: Arc<SessionLocks>,
    id: Option<Id>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl CeremonySession {
    /// Lock the session (if it already has an id) and load its state.
    ///
    /// A session without an id has never been saved, so no other request
    /// can hold it.
    pub async fn acquire(locks: Arc<SessionLocks>, session: Session) -> Result<Self, ApiError> {
        let id = session.id();
        let guard = match id {
            Some(id) => Some(locks.acquire(id).await),
            None => None,
        };

        let state = session
            .get::<SessionCeremonyState>(CEREMONY_STATE_KEY)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to load session: {e}")))?
            .unwrap_or_default();

        Ok(Self {
            session,
            state,
            locks,
            id,
            guard,
        })
    }

    pub fn state(&mut self) -> &mut SessionCeremonyState {
        &mut self.state
    }

    /// Write the state back and save the session, then release the lock.
    pub async fn commit(mut self) -> Result<(), ApiError> {
        let state = std::mem::take(&mut self.state);
        self.session
            .insert(CEREMONY_STATE_KEY, state)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to store session: {e}")))?;
        self.session
            .save()
            .await
            .map_err(|e| ApiError::internal(format!("Failed to save session: {e}")))?;
        Ok(())
    }
}

impl Drop for CeremonySession {
    fn drop(&mut self) {
        // Guard first, so the map entry is the last reference
        self.guard.take();
        if let Some(id) = &self.id {
            self.locks.release(id);
        }
    }
}
