//! Per-session ceremony state.
//!
//! The state is a plain value owned by the HTTP session record. The
//! orchestrator borrows it mutably for the duration of one ceremony step;
//! nothing here is shared between sessions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::documents::CeremonyResult;
use crate::error::{CeremonyError, Result};

/// Which ceremony a challenge was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CeremonyKind {
    Registration,
    Authentication,
}

impl std::fmt::Display for CeremonyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registration => write!(f, "registration"),
            Self::Authentication => write!(f, "authentication"),
        }
    }
}

/// Observable ceremony phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "ceremony", rename_all = "snake_case")]
pub enum CeremonyPhase {
    Idle,
    OfferIssued(CeremonyKind),
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PendingChallenge {
    #[serde(with = "codec::serde_bytes")]
    challenge: Vec<u8>,
    kind: CeremonyKind,
    issued_at: DateTime<Utc>,
}

/// User identity bound to the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(with = "codec::serde_bytes")]
    pub id: Vec<u8>,
    pub name: String,
    pub display_name: String,
}

impl UserIdentity {
    pub fn to_result(&self) -> CeremonyResult {
        CeremonyResult {
            id: codec::encode(&self.id).unwrap_or_default(),
            name: self.name.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Ceremony state attached to one HTTP session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCeremonyState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pending: Option<PendingChallenge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<UserIdentity>,
    #[serde(default)]
    authenticated: bool,
}

impl SessionCeremonyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a fresh challenge, superseding any unconsumed one, and return it
    /// encoded for transport.
    pub fn bind_challenge(
        &mut self,
        challenge: Vec<u8>,
        kind: CeremonyKind,
        issued_at: DateTime<Utc>,
    ) -> String {
        let encoded = codec::encode(&challenge).unwrap_or_default();
        self.pending = Some(PendingChallenge {
            challenge,
            kind,
            issued_at,
        });
        self.authenticated = false;
        encoded
    }

    pub fn bind_pending_user(&mut self, id: Vec<u8>, name: String, display_name: String) {
        self.user = Some(UserIdentity {
            id,
            name,
            display_name,
        });
    }

    /// Take the bound challenge for a completion of `kind`.
    ///
    /// The challenge is removed whatever the outcome, so a challenge can be
    /// presented at most once.
    pub fn consume_challenge(
        &mut self,
        kind: CeremonyKind,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Vec<u8>> {
        let pending = self.pending.take().ok_or(CeremonyError::NoPendingChallenge)?;

        if pending.kind != kind {
            tracing::warn!(
                target: "audit",
                expected = %kind,
                bound = %pending.kind,
                "Completion attempted against a challenge of the other ceremony"
            );
            return Err(CeremonyError::NoPendingChallenge);
        }

        // Clock going backwards counts as zero elapsed
        let elapsed = (now - pending.issued_at).to_std().unwrap_or_default();
        if elapsed >= ttl {
            return Err(CeremonyError::ChallengeExpired);
        }

        Ok(pending.challenge)
    }

    /// Flag the session as authenticated and return the caller-facing result.
    pub fn mark_authenticated(&mut self) -> Result<CeremonyResult> {
        let user = self
            .user
            .as_ref()
            .filter(|u| !u.id.is_empty() && !u.name.is_empty())
            .ok_or(CeremonyError::IncompleteIdentity)?;
        let result = user.to_result();
        self.authenticated = true;
        Ok(result)
    }

    /// Drop challenge, identity and authentication.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn phase(&self) -> CeremonyPhase {
        match (&self.pending, self.authenticated) {
            (Some(pending), _) => CeremonyPhase::OfferIssued(pending.kind),
            (None, true) => CeremonyPhase::Completed,
            (None, false) => CeremonyPhase::Idle,
        }
    }

    pub fn identity(&self) -> Option<&UserIdentity> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// The identity of an authenticated session.
    pub fn authenticated_user(&self) -> Option<CeremonyResult> {
        self.user
            .as_ref()
            .filter(|_| self.authenticated)
            .map(UserIdentity::to_result)
    }
}
