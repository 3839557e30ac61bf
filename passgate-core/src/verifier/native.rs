//! Built-in verifier for `none` and self-`packed` attestation.

use async_trait::async_trait;
use ciborium::Value;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::instrument;

use super::authdata::AuthenticatorData;
use super::cose_key::CoseKey;
use super::{
    AssertionExpectation, AssertionOutcome, AttestationExpectation, AttestationOutcome,
    UserVerificationPolicy, Verifier,
};
use crate::codec;
use crate::documents::PublicKeyCredential;
use crate::error::VerificationError;

const TYPE_CREATE: &str = "webauthn.create";
const TYPE_GET: &str = "webauthn.get";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientData {
    #[serde(rename = "type")]
    kind: String,
    challenge: String,
    origin: String,
    #[serde(default)]
    cross_origin: bool,
}

/// Verifier for ES256 and EdDSA credentials.
///
/// Certificate-chain attestation is rejected; relying parties that need it
/// plug in their own [`Verifier`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeVerifier;

impl NativeVerifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Verifier for NativeVerifier {
    #[instrument(skip_all, fields(credential_id = %credential.id))]
    async fn verify_attestation(
        &self,
        credential: &PublicKeyCredential,
        expectation: &AttestationExpectation,
    ) -> Result<AttestationOutcome, VerificationError> {
        let client_data_json = &credential.response.client_data_json;
        check_client_data(
            client_data_json,
            TYPE_CREATE,
            &expectation.challenge,
            &expectation.origin,
        )?;

        let attestation_object = credential
            .response
            .attestation_object
            .as_deref()
            .ok_or_else(|| VerificationError::new("missing attestationObject"))?;
        let (fmt, att_stmt, auth_data_bytes) = parse_attestation_object(attestation_object)?;

        let auth_data = AuthenticatorData::parse(&auth_data_bytes)?;
        check_auth_data(&auth_data, &expectation.rp_id, expectation.user_verification)?;

        let attested = auth_data
            .attested
            .as_ref()
            .ok_or_else(|| VerificationError::new("no attested credential data"))?;
        if attested.credential_id != credential.raw_id {
            return Err(VerificationError::new(
                "credential id does not match attested credential data",
            ));
        }

        let key = CoseKey::from_cbor(&attested.public_key)?;
        if !expectation.algorithms.contains(&key.algorithm()) {
            return Err(VerificationError::new(format!(
                "credential algorithm {} was not offered",
                key.algorithm().name()
            )));
        }

        match fmt.as_str() {
            "none" => {
                if !att_stmt.is_empty() {
                    return Err(VerificationError::new("non-empty attStmt for fmt none"));
                }
            }
            "packed" => verify_self_packed(&att_stmt, &key, &auth_data_bytes, client_data_json)?,
            other => {
                return Err(VerificationError::new(format!(
                    "unsupported attestation format {other}"
                )))
            }
        }

        tracing::debug!(fmt = %fmt, alg = %key.algorithm(), counter = auth_data.counter, "Attestation verified");

        Ok(AttestationOutcome {
            credential_id: codec::encode(&attested.credential_id).unwrap_or_default(),
            public_key: attested.public_key.clone(),
            counter: auth_data.counter,
        })
    }

    #[instrument(skip_all, fields(credential_id = %credential.id))]
    async fn verify_assertion(
        &self,
        credential: &PublicKeyCredential,
        expectation: &AssertionExpectation,
    ) -> Result<AssertionOutcome, VerificationError> {
        let response = &credential.response;
        check_client_data(
            &response.client_data_json,
            TYPE_GET,
            &expectation.challenge,
            &expectation.origin,
        )?;

        if let Some(handle) = &response.user_handle {
            if *handle != expectation.user_handle {
                return Err(VerificationError::new("user handle mismatch"));
            }
        }

        let auth_data_bytes = response
            .authenticator_data
            .as_deref()
            .ok_or_else(|| VerificationError::new("missing authenticatorData"))?;
        let signature = response
            .signature
            .as_deref()
            .ok_or_else(|| VerificationError::new("missing signature"))?;

        let auth_data = AuthenticatorData::parse(auth_data_bytes)?;
        check_auth_data(&auth_data, &expectation.rp_id, expectation.user_verification)?;

        let key = CoseKey::from_cbor(&expectation.public_key)?;
        key.verify(
            &signed_message(auth_data_bytes, &response.client_data_json),
            signature,
        )?;

        tracing::debug!(
            counter = auth_data.counter,
            previous = expectation.previous_counter,
            "Assertion signature verified"
        );

        Ok(AssertionOutcome {
            counter: auth_data.counter,
        })
    }
}

/// `authenticatorData || SHA-256(clientDataJSON)`
fn signed_message(auth_data: &[u8], client_data_json: &[u8]) -> Vec<u8> {
    let client_data_hash: [u8; 32] = Sha256::digest(client_data_json).into();
    let mut message = Vec::with_capacity(auth_data.len() + 32);
    message.extend_from_slice(auth_data);
    message.extend_from_slice(&client_data_hash);
    message
}

fn check_client_data(
    client_data_json: &[u8],
    expected_type: &str,
    challenge: &[u8],
    origin: &str,
) -> Result<(), VerificationError> {
    let client_data: ClientData = serde_json::from_slice(client_data_json)
        .map_err(|e| VerificationError::new(format!("malformed clientDataJSON: {e}")))?;

    if client_data.kind != expected_type {
        return Err(VerificationError::new(format!(
            "client data type {} != {expected_type}",
            client_data.kind
        )));
    }
    let presented = codec::decode_field("clientData.challenge", &client_data.challenge)
        .map_err(|e| VerificationError::new(e.to_string()))?;
    if presented != challenge {
        return Err(VerificationError::new("challenge mismatch"));
    }
    if client_data.origin != origin {
        return Err(VerificationError::new(format!(
            "origin {} not accepted",
            client_data.origin
        )));
    }
    if client_data.cross_origin {
        return Err(VerificationError::new("cross-origin ceremony rejected"));
    }
    Ok(())
}

fn check_auth_data(
    auth_data: &AuthenticatorData,
    rp_id: &str,
    policy: UserVerificationPolicy,
) -> Result<(), VerificationError> {
    let expected: [u8; 32] = Sha256::digest(rp_id.as_bytes()).into();
    if auth_data.rp_id_hash != expected {
        return Err(VerificationError::new("rpIdHash mismatch"));
    }
    if !auth_data.user_present() {
        return Err(VerificationError::new("user presence flag not set"));
    }
    if policy == UserVerificationPolicy::Required && !auth_data.user_verified() {
        return Err(VerificationError::new("user verification required"));
    }
    Ok(())
}

fn parse_attestation_object(
    bytes: &[u8],
) -> Result<(String, Vec<(Value, Value)>, Vec<u8>), VerificationError> {
    let value: Value = ciborium::from_reader(bytes)
        .map_err(|e| VerificationError::new(format!("malformed attestationObject: {e}")))?;
    let mut map = match value {
        Value::Map(map) => map,
        _ => return Err(VerificationError::new("attestationObject is not a map")),
    };

    let mut take = |name: &str| {
        map.iter()
            .position(|(k, _)| k.as_text() == Some(name))
            .map(|i| map.swap_remove(i).1)
    };

    let fmt = match take("fmt") {
        Some(Value::Text(fmt)) => fmt,
        _ => return Err(VerificationError::new("attestationObject.fmt missing")),
    };
    let att_stmt = match take("attStmt") {
        Some(Value::Map(stmt)) => stmt,
        _ => return Err(VerificationError::new("attestationObject.attStmt missing")),
    };
    let auth_data = match take("authData") {
        Some(Value::Bytes(data)) => data,
        _ => return Err(VerificationError::new("attestationObject.authData missing")),
    };
    Ok((fmt, att_stmt, auth_data))
}

fn verify_self_packed(
    att_stmt: &[(Value, Value)],
    key: &CoseKey,
    auth_data: &[u8],
    client_data_json: &[u8],
) -> Result<(), VerificationError> {
    let field = |name: &str| {
        att_stmt
            .iter()
            .find(|(k, _)| k.as_text() == Some(name))
            .map(|(_, v)| v)
    };

    if field("x5c").is_some() {
        return Err(VerificationError::new(
            "certificate-chain packed attestation is not supported",
        ));
    }
    let alg = field("alg")
        .and_then(Value::as_integer)
        .and_then(|i| i64::try_from(i).ok())
        .ok_or_else(|| VerificationError::new("packed attStmt.alg missing"))?;
    if alg != key.algorithm().id() {
        return Err(VerificationError::new("packed attStmt.alg does not match key"));
    }
    let sig = field("sig")
        .and_then(Value::as_bytes)
        .ok_or_else(|| VerificationError::new("packed attStmt.sig missing"))?;

    key.verify(&signed_message(auth_data, client_data_json), sig)
}
