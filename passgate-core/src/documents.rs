//! JSON transport documents exchanged between the orchestrator and the
//! client ceremony driver.
//!
//! Option documents flow server → client; credential documents flow
//! client → server. Binary members are base64url strings (see
//! [`crate::codec`]) and absent members are omitted, never `""`.

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::config::{AttestationPreference, UserVerificationRequirement};
use crate::cose::CoseAlgorithm;
use crate::error::CodecError;

pub const PUBLIC_KEY_CREDENTIAL_TYPE: &str = "public-key";

fn public_key_type() -> String {
    PUBLIC_KEY_CREDENTIAL_TYPE.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingPartyEntity {
    pub id: String,
    pub name: String,
}

/// User entity carried in registration options; `id` is the base64url
/// encoded user handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    pub id: String,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialParameter {
    #[serde(rename = "type", default = "public_key_type")]
    pub kind: String,
    pub alg: CoseAlgorithm,
}

impl From<CoseAlgorithm> for CredentialParameter {
    fn from(alg: CoseAlgorithm) -> Self {
        Self {
            kind: public_key_type(),
            alg,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    pub require_resident_key: bool,
    pub resident_key: String,
    pub user_verification: UserVerificationRequirement,
}

/// Options for `navigator.credentials.create()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub challenge: String,
    pub rp: RelyingPartyEntity,
    pub user: UserEntity,
    pub pub_key_cred_params: Vec<CredentialParameter>,
    pub timeout: u64,
    pub attestation: AttestationPreference,
    pub authenticator_selection: AuthenticatorSelection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDescriptor {
    #[serde(rename = "type", default = "public_key_type")]
    pub kind: String,
    pub id: String,
}

/// Options for `navigator.credentials.get()`.
///
/// `allowCredentials` is left empty: the user is discovered from the
/// resident credential's user handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    pub challenge: String,
    pub rp_id: String,
    pub timeout: u64,
    pub user_verification: UserVerificationRequirement,
    #[serde(default)]
    pub allow_credentials: Vec<CredentialDescriptor>,
}

/// Either option document, as received by a client that does not know in
/// advance which ceremony the endpoint serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionsDocument {
    Registration(RegistrationOptions),
    Authentication(AuthenticationOptions),
}

impl OptionsDocument {
    pub fn challenge(&self) -> &str {
        match self {
            Self::Registration(o) => &o.challenge,
            Self::Authentication(o) => &o.challenge,
        }
    }
}

impl From<RegistrationOptions> for OptionsDocument {
    fn from(options: RegistrationOptions) -> Self {
        Self::Registration(options)
    }
}

impl From<AuthenticationOptions> for OptionsDocument {
    fn from(options: AuthenticationOptions) -> Self {
        Self::Authentication(options)
    }
}

/// Authenticator response members; all binary, all optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialResponseDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation_object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_data: Option<String>,
    #[serde(rename = "clientDataJSON", default, skip_serializing_if = "Option::is_none")]
    pub client_data_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<String>,
}

/// A credential as posted back by the client driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDocument {
    /// Credential id, carried verbatim as the platform reported it.
    pub id: String,
    #[serde(rename = "type", default = "public_key_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<String>,
    pub response: CredentialResponseDocument,
}

impl CredentialDocument {
    /// Decode every binary member for verification.
    pub fn decode(&self) -> Result<PublicKeyCredential, CodecError> {
        if self.kind != PUBLIC_KEY_CREDENTIAL_TYPE {
            return Err(CodecError::MalformedEncoding {
                field: "type",
                reason: format!("unsupported credential type {:?}", self.kind),
            });
        }
        let r = &self.response;
        let client_data_json = codec::decode_opt("response.clientDataJSON", r.client_data_json.as_deref())?
            .ok_or(CodecError::MissingField("response.clientDataJSON"))?;

        Ok(PublicKeyCredential {
            id: self.id.clone(),
            raw_id: codec::decode_field("id", &self.id)?,
            response: AuthenticatorResponse {
                client_data_json,
                attestation_object: codec::decode_opt(
                    "response.attestationObject",
                    r.attestation_object.as_deref(),
                )?,
                authenticator_data: codec::decode_opt(
                    "response.authenticatorData",
                    r.authenticator_data.as_deref(),
                )?,
                signature: codec::decode_opt("response.signature", r.signature.as_deref())?,
                user_handle: codec::decode_opt("response.userHandle", r.user_handle.as_deref())?,
            },
        })
    }
}

/// Decoded authenticator response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorResponse {
    pub client_data_json: Vec<u8>,
    pub attestation_object: Option<Vec<u8>>,
    pub authenticator_data: Option<Vec<u8>>,
    pub signature: Option<Vec<u8>>,
    pub user_handle: Option<Vec<u8>>,
}

/// A credential with all binary members decoded, as handed to the verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyCredential {
    pub id: String,
    pub raw_id: Vec<u8>,
    pub response: AuthenticatorResponse,
}

/// Identity returned to the caller after a successful ceremony.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CeremonyResult {
    /// Base64url user handle.
    pub id: String,
    pub name: String,
    pub display_name: String,
}
