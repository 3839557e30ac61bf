//! Software authenticator.
//!
//! An in-process ES256 authenticator producing `none` attestations and
//! real assertion signatures. It backs the command-line client and the
//! end-to-end tests. Keys live in memory and in the JSON file the caller
//! chooses to persist; this is not a hardware-protected authenticator.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use ciborium::Value;
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::codec;
use crate::cose::CoseAlgorithm;
use crate::driver::{
    PlatformAssertionRequest, PlatformAuthenticator, PlatformCreationRequest, PlatformCredential,
};
use crate::error::{CeremonyError, Result};

const FLAGS_CREATE: u8 = 0x45; // UP | UV | AT
const FLAGS_GET: u8 = 0x05; // UP | UV
const CREDENTIAL_ID_LEN: usize = 16;

#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct ResidentCredential {
    #[serde(with = "codec::serde_bytes")]
    credential_id: Vec<u8>,
    rp_id: String,
    #[serde(with = "codec::serde_bytes")]
    user_handle: Vec<u8>,
    user_name: String,
    #[serde(with = "codec::serde_bytes")]
    private_key: Vec<u8>,
    counter: u32,
}

#[derive(Serialize, Deserialize)]
struct TokenState {
    origin: String,
    #[serde(default = "enabled")]
    counters: bool,
    #[serde(default)]
    credentials: Vec<ResidentCredential>,
    #[serde(skip)]
    cancel_next: bool,
    #[serde(skip)]
    preferred_user: Option<String>,
}

fn enabled() -> bool {
    true
}

/// Public view of a stored credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialSummary {
    pub rp_id: String,
    pub user_name: String,
    pub credential_id: String,
    pub counter: u32,
}

/// ES256 software authenticator with resident credentials.
pub struct SoftToken {
    state: Mutex<TokenState>,
}

impl SoftToken {
    /// A token that reports `origin` in its client data.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(TokenState {
                origin: origin.into(),
                counters: true,
                credentials: Vec::new(),
                cancel_next: false,
                preferred_user: None,
            }),
        }
    }

    /// Disable signature counters (every assertion reports 0).
    pub fn without_counters(self) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.counters = false;
        }
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let state: TokenState = serde_json::from_str(json)
            .map_err(|e| CeremonyError::Platform(format!("unreadable token file: {e}")))?;
        Ok(Self {
            state: Mutex::new(state),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        let state = self.lock()?;
        serde_json::to_string_pretty(&*state)
            .map_err(|e| CeremonyError::Platform(format!("cannot serialize token: {e}")))
    }

    /// Make the next ceremony fail as if the user dismissed the prompt.
    pub fn cancel_next(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.cancel_next = true;
        }
    }

    /// Prefer this user's credential when several match the relying party.
    pub fn prefer_user(&self, user_name: Option<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.preferred_user = user_name;
        }
    }

    pub fn origin(&self) -> Result<String> {
        Ok(self.lock()?.origin.clone())
    }

    pub fn credentials(&self) -> Result<Vec<CredentialSummary>> {
        Ok(self
            .lock()?
            .credentials
            .iter()
            .map(|c| CredentialSummary {
                rp_id: c.rp_id.clone(),
                user_name: c.user_name.clone(),
                credential_id: codec::encode(&c.credential_id).unwrap_or_default(),
                counter: c.counter,
            })
            .collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, TokenState>> {
        self.state
            .lock()
            .map_err(|_| CeremonyError::Platform("token state poisoned".into()))
    }

    fn take_cancellation(state: &mut TokenState) -> Result<()> {
        if std::mem::take(&mut state.cancel_next) {
            return Err(CeremonyError::UserCancelled);
        }
        Ok(())
    }
}

impl std::fmt::Debug for SoftToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.state.lock().map(|s| s.credentials.len()).unwrap_or(0);
        f.debug_struct("SoftToken")
            .field("credentials", &count)
            .finish_non_exhaustive()
    }
}

#[async_trait(?Send)]
impl PlatformAuthenticator for SoftToken {
    async fn create(&self, request: &PlatformCreationRequest) -> Result<PlatformCredential> {
        let mut state = self.lock()?;
        Self::take_cancellation(&mut state)?;

        if !request.algorithms.contains(&CoseAlgorithm::ES256) {
            return Err(CeremonyError::Platform(
                "relying party does not accept ES256".into(),
            ));
        }

        let signing_key = generate_signing_key()?;
        let credential_id = random_bytes(CREDENTIAL_ID_LEN)?;
        let client_data_json = client_data("webauthn.create", &request.challenge, &state.origin)?;

        let mut auth_data = auth_data_header(&request.rp.id, FLAGS_CREATE, 0);
        auth_data.extend_from_slice(&[0u8; 16]); // AAGUID
        auth_data.extend_from_slice(&(CREDENTIAL_ID_LEN as u16).to_be_bytes());
        auth_data.extend_from_slice(&credential_id);
        auth_data.extend_from_slice(&cose_public_key(&signing_key)?);

        let attestation_object = cbor(&Value::Map(vec![
            (Value::Text("fmt".into()), Value::Text("none".into())),
            (Value::Text("attStmt".into()), Value::Map(Vec::new())),
            (Value::Text("authData".into()), Value::Bytes(auth_data)),
        ]))?;

        // Resident keys: one credential per (rp, user handle)
        state
            .credentials
            .retain(|c| !(c.rp_id == request.rp.id && c.user_handle == request.user_id));
        state.credentials.push(ResidentCredential {
            credential_id: credential_id.clone(),
            rp_id: request.rp.id.clone(),
            user_handle: request.user_id.clone(),
            user_name: request.user_name.clone(),
            private_key: signing_key.to_bytes().to_vec(),
            counter: 0,
        });

        Ok(PlatformCredential {
            id: codec::encode(&credential_id).unwrap_or_default(),
            kind: "public-key".into(),
            authenticator_attachment: Some("cross-platform".into()),
            client_data_json,
            attestation_object: Some(attestation_object),
            ..Default::default()
        })
    }

    async fn get(&self, request: &PlatformAssertionRequest) -> Result<PlatformCredential> {
        let mut state = self.lock()?;
        Self::take_cancellation(&mut state)?;

        let origin = state.origin.clone();
        let counters = state.counters;
        let preferred = state.preferred_user.clone();
        let credential = state
            .credentials
            .iter_mut()
            .rev()
            .filter(|c| c.rp_id == request.rp_id)
            .filter(|c| {
                request.allow_credentials.is_empty()
                    || request.allow_credentials.contains(&c.credential_id)
            })
            .find(|c| preferred.as_ref().map_or(true, |name| *name == c.user_name))
            .ok_or_else(|| {
                CeremonyError::Platform(format!("no credential for {}", request.rp_id))
            })?;

        if counters {
            credential.counter = credential.counter.wrapping_add(1);
        }

        let client_data_json = client_data("webauthn.get", &request.challenge, &origin)?;
        let auth_data = auth_data_header(&request.rp_id, FLAGS_GET, credential.counter);

        let signing_key = SigningKey::from_slice(&credential.private_key)
            .map_err(|_| CeremonyError::Platform("corrupt credential key".into()))?;
        let mut message = auth_data.clone();
        message.extend_from_slice(&Sha256::digest(&client_data_json));
        let signature: Signature = signing_key.sign(&message);

        Ok(PlatformCredential {
            id: codec::encode(&credential.credential_id).unwrap_or_default(),
            kind: "public-key".into(),
            authenticator_attachment: Some("cross-platform".into()),
            client_data_json,
            authenticator_data: Some(auth_data),
            signature: Some(signature.to_der().as_bytes().to_vec()),
            user_handle: Some(credential.user_handle.clone()),
            ..Default::default()
        })
    }
}

fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    getrandom::fill(&mut buf).map_err(|e| CeremonyError::Entropy(e.to_string()))?;
    Ok(buf)
}

fn generate_signing_key() -> Result<SigningKey> {
    // Out-of-range scalars are astronomically rare; retry a few times
    for _ in 0..8 {
        let mut seed = random_bytes(32)?;
        let key = SigningKey::from_slice(&seed);
        seed.zeroize();
        if let Ok(key) = key {
            return Ok(key);
        }
    }
    Err(CeremonyError::Entropy("could not derive a P-256 key".into()))
}

fn client_data(kind: &str, challenge: &[u8], origin: &str) -> Result<Vec<u8>> {
    serde_json::to_vec(&serde_json::json!({
        "type": kind,
        "challenge": codec::encode(challenge).unwrap_or_default(),
        "origin": origin,
        "crossOrigin": false,
    }))
    .map_err(|e| CeremonyError::Platform(e.to_string()))
}

fn auth_data_header(rp_id: &str, flags: u8, counter: u32) -> Vec<u8> {
    let mut data = Sha256::digest(rp_id.as_bytes()).to_vec();
    data.push(flags);
    data.extend_from_slice(&counter.to_be_bytes());
    data
}

fn cose_public_key(key: &SigningKey) -> Result<Vec<u8>> {
    let point = key.verifying_key().to_encoded_point(false);
    let (x, y) = match (point.x(), point.y()) {
        (Some(x), Some(y)) => (x.to_vec(), y.to_vec()),
        _ => return Err(CeremonyError::Platform("identity public key".into())),
    };
    cbor(&Value::Map(vec![
        (Value::Integer(1.into()), Value::Integer(2.into())),
        (Value::Integer(3.into()), Value::Integer((-7).into())),
        (Value::Integer((-1).into()), Value::Integer(1.into())),
        (Value::Integer((-2).into()), Value::Bytes(x)),
        (Value::Integer((-3).into()), Value::Bytes(y)),
    ]))
}

fn cbor(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out).map_err(|e| CeremonyError::Platform(e.to_string()))?;
    Ok(out)
}
