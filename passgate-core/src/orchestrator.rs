//! Ceremony orchestrator.
//!
//! Drives the four ceremony operations against a caller-owned
//! [`SessionCeremonyState`]:
//!
//! ```text
//! Idle ──offer──▶ OfferIssued ──complete ok──▶ Completed
//!                      │
//!                      └──complete err──▶ Idle
//! ```
//!
//! Every completion consumes the bound challenge before anything else, so a
//! challenge can be presented once. The credential store is written only
//! after the verifier has accepted the credential.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use crate::challenge::ChallengeSource;
use crate::codec;
use crate::config::CeremonyConfig;
use crate::documents::{
    AuthenticationOptions, AuthenticatorSelection, CeremonyResult, CredentialDocument,
    CredentialParameter, PublicKeyCredential, RegistrationOptions, RelyingPartyEntity, UserEntity,
};
use crate::error::{CeremonyError, Result};
use crate::session::{CeremonyKind, SessionCeremonyState};
use crate::store::{CredentialRecord, CredentialStore};
use crate::verifier::{AssertionExpectation, AttestationExpectation, Verifier};

/// Longest accepted user name, in bytes.
pub const MAX_USER_NAME_LEN: usize = 64;

/// Signature counter rule.
///
/// A reported counter is accepted if it strictly increases, or if both
/// sides are zero (authenticator without counter support).
pub fn counter_accepted(stored: u32, reported: u32) -> bool {
    reported > stored || (stored == 0 && reported == 0)
}

/// Stateless driver of WebAuthn ceremonies; all per-user state lives in the
/// [`SessionCeremonyState`] passed to each call.
#[derive(Clone)]
pub struct Orchestrator {
    config: CeremonyConfig,
    verifier: Arc<dyn Verifier>,
    store: Arc<dyn CredentialStore>,
    challenges: Arc<dyn ChallengeSource>,
}

impl Orchestrator {
    pub fn new(
        config: CeremonyConfig,
        verifier: Arc<dyn Verifier>,
        store: Arc<dyn CredentialStore>,
        challenges: Arc<dyn ChallengeSource>,
    ) -> Self {
        Self {
            config,
            verifier,
            store,
            challenges,
        }
    }

    pub fn config(&self) -> &CeremonyConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    fn fresh_challenge(&self) -> Result<Vec<u8>> {
        let len = self.config.challenge_len();
        let challenge = self.challenges.generate(len)?;
        if challenge.len() != len {
            return Err(CeremonyError::Entropy(format!(
                "{} source returned {} bytes, wanted {len}",
                self.challenges.source_id(),
                challenge.len()
            )));
        }
        Ok(challenge)
    }

    /// Issue registration options for a new user and bind them to the session.
    #[instrument(skip(self, state, display_name))]
    pub fn offer_registration(
        &self,
        state: &mut SessionCeremonyState,
        user_name: &str,
        display_name: Option<&str>,
    ) -> Result<RegistrationOptions> {
        let user_name = user_name.trim();
        if user_name.is_empty() {
            return Err(CeremonyError::InvalidRequest("user name is required".into()));
        }
        if user_name.len() > MAX_USER_NAME_LEN {
            return Err(CeremonyError::InvalidRequest(format!(
                "user name exceeds {MAX_USER_NAME_LEN} bytes"
            )));
        }
        let display_name = display_name.unwrap_or("").trim().to_string();

        let challenge = self.fresh_challenge()?;
        let user_id = uuid::Uuid::new_v4().as_bytes().to_vec();
        let encoded_user_id = codec::encode(&user_id).unwrap_or_default();

        state.clear();
        state.bind_pending_user(user_id, user_name.to_string(), display_name.clone());
        let encoded_challenge = state.bind_challenge(challenge, CeremonyKind::Registration, Utc::now());

        tracing::debug!(user_id = %encoded_user_id, "Registration offer issued");

        let config = &self.config;
        Ok(RegistrationOptions {
            challenge: encoded_challenge,
            rp: RelyingPartyEntity {
                id: config.relying_party_id().to_string(),
                name: config.relying_party_name().to_string(),
            },
            user: UserEntity {
                id: encoded_user_id,
                name: user_name.to_string(),
                display_name,
            },
            pub_key_cred_params: config
                .algorithms()
                .iter()
                .copied()
                .map(CredentialParameter::from)
                .collect(),
            timeout: config.timeout().as_millis() as u64,
            attestation: config.attestation(),
            authenticator_selection: AuthenticatorSelection {
                require_resident_key: config.require_resident_key(),
                resident_key: if config.require_resident_key() {
                    "required".into()
                } else {
                    "preferred".into()
                },
                user_verification: config.user_verification(),
            },
        })
    }

    /// Verify a registration credential and persist it.
    #[instrument(skip_all, fields(credential_id = %credential.id))]
    pub async fn complete_registration(
        &self,
        state: &mut SessionCeremonyState,
        credential: &CredentialDocument,
    ) -> Result<CeremonyResult> {
        let result = self.try_complete_registration(state, credential).await;
        if let Err(e) = &result {
            tracing::info!(error = %e, "Registration rejected");
            state.clear();
        }
        result
    }

    async fn try_complete_registration(
        &self,
        state: &mut SessionCeremonyState,
        credential: &CredentialDocument,
    ) -> Result<CeremonyResult> {
        let challenge = state.consume_challenge(
            CeremonyKind::Registration,
            Utc::now(),
            self.config.challenge_ttl(),
        )?;
        let user = state
            .identity()
            .cloned()
            .ok_or(CeremonyError::IncompleteIdentity)?;
        let credential: PublicKeyCredential = credential.decode()?;

        let expectation = AttestationExpectation {
            challenge,
            origin: self.config.origin(),
            rp_id: self.config.relying_party_id().to_string(),
            user_verification: self.config.user_verification().into(),
            algorithms: self.config.algorithms().to_vec(),
        };
        let outcome = self
            .verifier
            .verify_attestation(&credential, &expectation)
            .await
            .map_err(|e| CeremonyError::RegistrationFailed(e.to_string()))?;

        self.store
            .save(CredentialRecord {
                id: user.id,
                name: user.name,
                display_name: user.display_name,
                credential_id: outcome.credential_id,
                public_key: outcome.public_key,
                counter: outcome.counter,
            })
            .await
            .map_err(CeremonyError::Store)?;

        let result = state.mark_authenticated()?;
        tracing::info!(user = %result.name, "Registration completed");
        Ok(result)
    }

    /// Issue authentication options. The user is discovered from the
    /// credential, so any identity on the session is dropped.
    #[instrument(skip_all)]
    pub fn offer_authentication(
        &self,
        state: &mut SessionCeremonyState,
    ) -> Result<AuthenticationOptions> {
        let challenge = self.fresh_challenge()?;
        state.clear();
        let encoded_challenge =
            state.bind_challenge(challenge, CeremonyKind::Authentication, Utc::now());

        tracing::debug!("Authentication offer issued");

        Ok(AuthenticationOptions {
            challenge: encoded_challenge,
            rp_id: self.config.relying_party_id().to_string(),
            timeout: self.config.timeout().as_millis() as u64,
            user_verification: self.config.user_verification(),
            allow_credentials: Vec::new(),
        })
    }

    /// Verify an assertion against the stored credential and enforce the
    /// signature counter.
    #[instrument(skip_all, fields(credential_id = %credential.id))]
    pub async fn complete_authentication(
        &self,
        state: &mut SessionCeremonyState,
        credential: &CredentialDocument,
    ) -> Result<CeremonyResult> {
        let result = self.try_complete_authentication(state, credential).await;
        if let Err(e) = &result {
            tracing::info!(error = %e, "Authentication rejected");
            state.clear();
        }
        result
    }

    async fn try_complete_authentication(
        &self,
        state: &mut SessionCeremonyState,
        credential: &CredentialDocument,
    ) -> Result<CeremonyResult> {
        let challenge = state.consume_challenge(
            CeremonyKind::Authentication,
            Utc::now(),
            self.config.challenge_ttl(),
        )?;
        let credential: PublicKeyCredential = credential.decode()?;

        let user_handle = credential
            .response
            .user_handle
            .clone()
            .ok_or_else(|| CeremonyError::AssertionFailed("credential carries no user handle".into()))?;

        // NotFound maps to UnknownCredential; callers render it like any
        // other assertion failure
        let record = self.store.load(&user_handle).await?;

        if record.credential_id != credential.id {
            return Err(CeremonyError::AssertionFailed(
                "credential id does not match the registered credential".into(),
            ));
        }

        let expectation = AssertionExpectation {
            challenge,
            origin: self.config.origin(),
            rp_id: self.config.relying_party_id().to_string(),
            user_verification: self.config.user_verification().into(),
            user_handle: user_handle.clone(),
            public_key: record.public_key.clone(),
            previous_counter: record.counter,
        };
        let outcome = self
            .verifier
            .verify_assertion(&credential, &expectation)
            .await
            .map_err(|e| CeremonyError::AssertionFailed(e.to_string()))?;

        if !counter_accepted(record.counter, outcome.counter) {
            tracing::warn!(
                target: "audit",
                user_id = %codec::encode(&record.id).unwrap_or_default(),
                credential_id = %record.credential_id,
                stored = record.counter,
                reported = outcome.counter,
                "Signature counter did not increase; possible cloned authenticator"
            );
            return Err(CeremonyError::CounterRegression {
                stored: record.counter,
                reported: outcome.counter,
            });
        }

        if outcome.counter != record.counter {
            let swapped = self
                .store
                .update_counter(&record.id, record.counter, outcome.counter)
                .await
                .map_err(CeremonyError::Store)?;
            if !swapped {
                // Another assertion with this credential advanced the counter
                // since it was loaded
                tracing::warn!(
                    target: "audit",
                    user_id = %codec::encode(&record.id).unwrap_or_default(),
                    credential_id = %record.credential_id,
                    stored = record.counter,
                    reported = outcome.counter,
                    "Concurrent assertion moved the signature counter; possible cloned authenticator"
                );
                return Err(CeremonyError::CounterRegression {
                    stored: record.counter,
                    reported: outcome.counter,
                });
            }
        }

        state.bind_pending_user(record.id, record.name, record.display_name);
        let result = state.mark_authenticated()?;
        tracing::info!(user = %result.name, counter = outcome.counter, "Authentication completed");
        Ok(result)
    }

    /// Forget everything bound to the session.
    pub fn logout(&self, state: &mut SessionCeremonyState) {
        state.clear();
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("challenge_source", &self.challenges.source_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::OsChallengeSource;
    use crate::documents::CredentialResponseDocument;
    use crate::error::{StoreError, VerificationError};
    use crate::session::CeremonyPhase;
    use crate::store::MemoryCredentialStore;
    use crate::verifier::{AssertionOutcome, AttestationOutcome};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex;

    const CRED_ID: &str = "Y3JlZC0x";

    /// Verifier double: checks the bound challenge against clientDataJSON
    /// (which the tests set to the raw challenge) and reports a scripted
    /// counter.
    #[derive(Default)]
    struct StubVerifier {
        reject: std::sync::atomic::AtomicBool,
        counter: AtomicU32,
        calls: AtomicUsize,
        seen_previous: Mutex<Vec<u32>>,
        /// Counters handed out in order before falling back to `counter`.
        scripted: Mutex<std::collections::VecDeque<u32>>,
        /// Suspend once mid-verification so concurrent ceremonies interleave.
        yield_once: std::sync::atomic::AtomicBool,
    }

    impl StubVerifier {
        fn with_counter(counter: u32) -> Self {
            let v = Self::default();
            v.counter.store(counter, Ordering::SeqCst);
            v
        }
    }

    #[async_trait]
    impl Verifier for StubVerifier {
        async fn verify_attestation(
            &self,
            credential: &PublicKeyCredential,
            expectation: &AttestationExpectation,
        ) -> std::result::Result<AttestationOutcome, VerificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.reject.load(Ordering::SeqCst)
                || credential.response.client_data_json != expectation.challenge
            {
                return Err(VerificationError::new("stub rejected"));
            }
            Ok(AttestationOutcome {
                credential_id: credential.id.clone(),
                public_key: b"PK".to_vec(),
                counter: self.counter.load(Ordering::SeqCst),
            })
        }

        async fn verify_assertion(
            &self,
            credential: &PublicKeyCredential,
            expectation: &AssertionExpectation,
        ) -> std::result::Result<AssertionOutcome, VerificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_previous
                .lock()
                .unwrap()
                .push(expectation.previous_counter);
            if self.reject.load(Ordering::SeqCst)
                || credential.response.client_data_json != expectation.challenge
                || expectation.public_key != b"PK"
            {
                return Err(VerificationError::new("stub rejected"));
            }
            let counter = self
                .scripted
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.counter.load(Ordering::SeqCst));
            if self.yield_once.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
            Ok(AssertionOutcome { counter })
        }
    }

    /// Store wrapper that counts writes.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryCredentialStore,
        saves: AtomicUsize,
        saved: Mutex<Vec<CredentialRecord>>,
    }

    #[async_trait]
    impl CredentialStore for CountingStore {
        async fn save(&self, record: CredentialRecord) -> std::result::Result<(), StoreError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.saved.lock().unwrap().push(record.clone());
            self.inner.save(record).await
        }

        async fn load(&self, id: &[u8]) -> std::result::Result<CredentialRecord, StoreError> {
            self.inner.load(id).await
        }

        async fn update_counter(
            &self,
            id: &[u8],
            expected: u32,
            counter: u32,
        ) -> std::result::Result<bool, StoreError> {
            self.inner.update_counter(id, expected, counter).await
        }
    }

    struct Fixture {
        orchestrator: Orchestrator,
        verifier: Arc<StubVerifier>,
        store: Arc<CountingStore>,
    }

    fn fixture(counter: u32) -> Fixture {
        let verifier = Arc::new(StubVerifier::with_counter(counter));
        let store = Arc::new(CountingStore::default());
        let config = CeremonyConfig::builder("example.com").build().unwrap();
        let orchestrator = Orchestrator::new(
            config,
            verifier.clone(),
            store.clone(),
            Arc::new(OsChallengeSource),
        );
        Fixture {
            orchestrator,
            verifier,
            store,
        }
    }

    /// Credential whose clientDataJSON is the raw challenge, for the stub.
    fn credential(challenge_b64: &str, user_handle: Option<&str>) -> CredentialDocument {
        CredentialDocument {
            id: CRED_ID.into(),
            kind: "public-key".into(),
            authenticator_attachment: None,
            response: CredentialResponseDocument {
                client_data_json: Some(challenge_b64.to_string()),
                attestation_object: Some("AA".into()),
                authenticator_data: Some("AA".into()),
                signature: Some("AA".into()),
                user_handle: user_handle.map(str::to_string),
            },
        }
    }

    async fn register(f: &Fixture, state: &mut SessionCeremonyState) -> CeremonyResult {
        let options = f
            .orchestrator
            .offer_registration(state, "alice", None)
            .unwrap();
        f.orchestrator
            .complete_registration(state, &credential(&options.challenge, None))
            .await
            .unwrap()
    }

    async fn authenticate(
        f: &Fixture,
        state: &mut SessionCeremonyState,
        handle: &str,
    ) -> Result<CeremonyResult> {
        let options = f.orchestrator.offer_authentication(state).unwrap();
        f.orchestrator
            .complete_authentication(state, &credential(&options.challenge, Some(handle)))
            .await
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    #[tokio::test]
    async fn test_registration_scenario() {
        let f = fixture(0);
        let mut state = SessionCeremonyState::new();

        let options = f
            .orchestrator
            .offer_registration(&mut state, "alice", None)
            .unwrap();
        assert!(codec::decode(&options.challenge).unwrap().len() >= 16);
        assert_eq!(codec::decode(&options.user.id).unwrap().len(), 16);
        assert_eq!(options.rp.id, "example.com");
        assert_eq!(options.pub_key_cred_params.len(), 2);
        assert!(options.authenticator_selection.require_resident_key);
        assert_eq!(
            state.phase(),
            CeremonyPhase::OfferIssued(CeremonyKind::Registration)
        );

        let result = f
            .orchestrator
            .complete_registration(&mut state, &credential(&options.challenge, None))
            .await
            .unwrap();
        assert_eq!(result.name, "alice");
        assert_eq!(result.display_name, "");
        assert_eq!(result.id, options.user.id);
        assert!(state.is_authenticated());
        assert_eq!(state.phase(), CeremonyPhase::Completed);

        let saved = f.store.saved.lock().unwrap().clone();
        assert_eq!(saved.len(), 1);
        assert_eq!(codec::encode(&saved[0].id).unwrap(), options.user.id);
        assert_eq!(saved[0].name, "alice");
        assert_eq!(saved[0].display_name, "");
        assert_eq!(saved[0].public_key, b"PK");
        assert_eq!(saved[0].counter, 0);
        assert_eq!(saved[0].credential_id, CRED_ID);
    }

    #[tokio::test]
    async fn test_offer_registration_validates_name() {
        let f = fixture(0);
        let mut state = SessionCeremonyState::new();
        assert!(matches!(
            f.orchestrator.offer_registration(&mut state, "  ", None),
            Err(CeremonyError::InvalidRequest(_))
        ));
        let long = "x".repeat(MAX_USER_NAME_LEN + 1);
        assert!(matches!(
            f.orchestrator.offer_registration(&mut state, &long, None),
            Err(CeremonyError::InvalidRequest(_))
        ));
        assert_eq!(state.phase(), CeremonyPhase::Idle);
    }

    #[tokio::test]
    async fn test_offer_registration_uses_display_name() {
        let f = fixture(0);
        let mut state = SessionCeremonyState::new();
        let options = f
            .orchestrator
            .offer_registration(&mut state, "alice", Some("Alice Liddell"))
            .unwrap();
        assert_eq!(options.user.display_name, "Alice Liddell");
    }

    #[tokio::test]
    async fn test_complete_without_offer_fails() {
        let f = fixture(0);
        let mut state = SessionCeremonyState::new();
        let err = f
            .orchestrator
            .complete_registration(&mut state, &credential("AAAA", None))
            .await
            .unwrap_err();
        assert!(matches!(err, CeremonyError::NoPendingChallenge));
        assert_eq!(f.verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_registration_replay_fails() {
        let f = fixture(0);
        let mut state = SessionCeremonyState::new();
        let options = f
            .orchestrator
            .offer_registration(&mut state, "alice", None)
            .unwrap();
        let cred = credential(&options.challenge, None);
        f.orchestrator
            .complete_registration(&mut state, &cred)
            .await
            .unwrap();

        let err = f
            .orchestrator
            .complete_registration(&mut state, &cred)
            .await
            .unwrap_err();
        assert!(matches!(err, CeremonyError::NoPendingChallenge));
        assert_eq!(f.store.saves.load(Ordering::SeqCst), 1);
        assert!(!state.is_authenticated());
    }

    #[tokio::test]
    async fn test_second_offer_invalidates_first_challenge() {
        let f = fixture(0);
        let mut state = SessionCeremonyState::new();
        let first = f
            .orchestrator
            .offer_registration(&mut state, "alice", None)
            .unwrap();
        let _second = f
            .orchestrator
            .offer_registration(&mut state, "alice", None)
            .unwrap();

        let err = f
            .orchestrator
            .complete_registration(&mut state, &credential(&first.challenge, None))
            .await
            .unwrap_err();
        assert!(matches!(err, CeremonyError::RegistrationFailed(_)));
        assert_eq!(f.store.saves.load(Ordering::SeqCst), 0);
        assert_eq!(state.phase(), CeremonyPhase::Idle);
    }

    #[tokio::test]
    async fn test_verifier_failure_writes_nothing() {
        let f = fixture(0);
        f.verifier.reject.store(true, Ordering::SeqCst);
        let mut state = SessionCeremonyState::new();
        let options = f
            .orchestrator
            .offer_registration(&mut state, "alice", None)
            .unwrap();
        let err = f
            .orchestrator
            .complete_registration(&mut state, &credential(&options.challenge, None))
            .await
            .unwrap_err();
        assert!(matches!(err, CeremonyError::RegistrationFailed(_)));
        assert_eq!(f.store.saves.load(Ordering::SeqCst), 0);
        assert!(!state.is_authenticated());
        assert!(state.identity().is_none());
    }

    #[tokio::test]
    async fn test_malformed_credential_is_rejected_and_consumes_challenge() {
        let f = fixture(0);
        let mut state = SessionCeremonyState::new();
        let options = f
            .orchestrator
            .offer_registration(&mut state, "alice", None)
            .unwrap();
        let mut cred = credential(&options.challenge, None);
        cred.response.attestation_object = Some("***".into());
        let err = f
            .orchestrator
            .complete_registration(&mut state, &cred)
            .await
            .unwrap_err();
        assert!(matches!(err, CeremonyError::MalformedEncoding(_)));
        assert_eq!(state.phase(), CeremonyPhase::Idle);
    }

    #[tokio::test]
    async fn test_registration_challenge_cannot_complete_authentication() {
        let f = fixture(0);
        let mut state = SessionCeremonyState::new();
        let options = f
            .orchestrator
            .offer_registration(&mut state, "alice", None)
            .unwrap();
        let err = f
            .orchestrator
            .complete_authentication(&mut state, &credential(&options.challenge, Some("AAAA")))
            .await
            .unwrap_err();
        assert!(matches!(err, CeremonyError::NoPendingChallenge));
    }

    #[tokio::test]
    async fn test_expired_challenge_rejected() {
        let verifier = Arc::new(StubVerifier::default());
        let config = CeremonyConfig::builder("example.com")
            .challenge_ttl(std::time::Duration::from_nanos(1))
            .build()
            .unwrap();
        let orchestrator = Orchestrator::new(
            config,
            verifier,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(OsChallengeSource),
        );
        let mut state = SessionCeremonyState::new();
        let options = orchestrator
            .offer_registration(&mut state, "alice", None)
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let err = orchestrator
            .complete_registration(&mut state, &credential(&options.challenge, None))
            .await
            .unwrap_err();
        assert!(matches!(err, CeremonyError::ChallengeExpired));
        assert_eq!(state.phase(), CeremonyPhase::Idle);
    }

    // ==========================================================================
    // Authentication
    // ==========================================================================

    #[tokio::test]
    async fn test_authentication_roundtrip() {
        let f = fixture(0);
        let mut state = SessionCeremonyState::new();
        let registered = register(&f, &mut state).await;

        f.verifier.counter.store(1, Ordering::SeqCst);
        let mut fresh = SessionCeremonyState::new();
        let result = authenticate(&f, &mut fresh, &registered.id).await.unwrap();
        assert_eq!(result, registered);
        assert!(fresh.is_authenticated());
        let stored = f
            .store
            .load(&codec::decode(&registered.id).unwrap())
            .await
            .unwrap();
        assert_eq!(stored.counter, 1);
    }

    #[tokio::test]
    async fn test_counter_must_increase() {
        let f = fixture(5);
        let mut state = SessionCeremonyState::new();
        let registered = register(&f, &mut state).await;

        // N == stored
        let err = authenticate(&f, &mut state, &registered.id).await.unwrap_err();
        assert!(matches!(
            err,
            CeremonyError::CounterRegression { stored: 5, reported: 5 }
        ));
        assert!(!state.is_authenticated());

        f.verifier.counter.store(6, Ordering::SeqCst);
        authenticate(&f, &mut state, &registered.id).await.unwrap();

        // replaying N after acceptance
        let err = authenticate(&f, &mut state, &registered.id).await.unwrap_err();
        assert!(matches!(
            err,
            CeremonyError::CounterRegression { stored: 6, reported: 6 }
        ));

        f.verifier.counter.store(0, Ordering::SeqCst);
        let err = authenticate(&f, &mut state, &registered.id).await.unwrap_err();
        assert!(matches!(err, CeremonyError::CounterRegression { .. }));

        assert_eq!(*f.verifier.seen_previous.lock().unwrap(), vec![5, 5, 6, 6]);
    }

    #[tokio::test]
    async fn test_concurrent_assertions_accept_only_one() {
        for (first, second) in [(6, 7), (7, 6)] {
            let f = fixture(5);
            let mut state = SessionCeremonyState::new();
            let registered = register(&f, &mut state).await;
            f.verifier.scripted.lock().unwrap().extend([first, second]);
            f.verifier.yield_once.store(true, Ordering::SeqCst);

            // Both sessions load the stored counter before either writes
            let mut a = SessionCeremonyState::new();
            let mut b = SessionCeremonyState::new();
            let (ra, rb) = tokio::join!(
                authenticate(&f, &mut a, &registered.id),
                authenticate(&f, &mut b, &registered.id)
            );
            assert_eq!(*f.verifier.seen_previous.lock().unwrap(), vec![5, 5]);
            assert_eq!(a.is_authenticated(), ra.is_ok());
            assert_eq!(b.is_authenticated(), rb.is_ok());

            let losing = match (ra, rb) {
                (Ok(_), Err(err)) | (Err(err), Ok(_)) => err,
                other => panic!("expected exactly one acceptance, got {other:?}"),
            };
            let CeremonyError::CounterRegression { stored: 5, reported } = losing else {
                panic!("unexpected error {losing:?}");
            };
            let winning = if reported == first { second } else { first };

            let stored = f
                .store
                .load(&codec::decode(&registered.id).unwrap())
                .await
                .unwrap()
                .counter;
            assert_eq!(stored, winning, "counters {first}, {second}");
        }
    }

    #[tokio::test]
    async fn test_counterless_authenticator_accepted_repeatedly() {
        let f = fixture(0);
        let mut state = SessionCeremonyState::new();
        let registered = register(&f, &mut state).await;
        for _ in 0..3 {
            authenticate(&f, &mut state, &registered.id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_unknown_user_handle_fails_generically() {
        let f = fixture(1);
        let mut state = SessionCeremonyState::new();
        let err = authenticate(&f, &mut state, "dW5rbm93bg").await.unwrap_err();
        assert!(matches!(err, CeremonyError::UnknownCredential));
        assert_eq!(f.verifier.calls.load(Ordering::SeqCst), 0);
        assert!(!state.is_authenticated());
    }

    #[tokio::test]
    async fn test_missing_user_handle_fails() {
        let f = fixture(1);
        let mut state = SessionCeremonyState::new();
        let options = f.orchestrator.offer_authentication(&mut state).unwrap();
        let err = f
            .orchestrator
            .complete_authentication(&mut state, &credential(&options.challenge, None))
            .await
            .unwrap_err();
        assert!(matches!(err, CeremonyError::AssertionFailed(_)));
    }

    #[tokio::test]
    async fn test_credential_id_must_match_record() {
        let f = fixture(0);
        let mut state = SessionCeremonyState::new();
        let registered = register(&f, &mut state).await;

        let options = f.orchestrator.offer_authentication(&mut state).unwrap();
        let mut cred = credential(&options.challenge, Some(&registered.id));
        cred.id = "b3RoZXI".into();
        let err = f
            .orchestrator
            .complete_authentication(&mut state, &cred)
            .await
            .unwrap_err();
        assert!(matches!(err, CeremonyError::AssertionFailed(_)));
    }

    #[tokio::test]
    async fn test_offer_authentication_drops_identity_and_logout_clears() {
        let f = fixture(0);
        let mut state = SessionCeremonyState::new();
        register(&f, &mut state).await;
        assert!(state.identity().is_some());

        f.orchestrator.offer_authentication(&mut state).unwrap();
        assert!(state.identity().is_none());
        assert!(!state.is_authenticated());

        f.orchestrator.logout(&mut state);
        assert_eq!(state.phase(), CeremonyPhase::Idle);
    }

    #[test]
    fn test_counter_rule() {
        assert!(counter_accepted(0, 0));
        assert!(counter_accepted(0, 1));
        assert!(counter_accepted(5, 6));
        assert!(!counter_accepted(5, 5));
        assert!(!counter_accepted(5, 0));
        assert!(!counter_accepted(1, 0));
    }
}
