//! Client ceremony driver.
//!
//! Fetches an option document, decodes it into a platform request, lets the
//! platform authenticator run the ceremony, re-encodes the credential and
//! posts it back. The driver keeps no state between calls.
//!
//! Both seams are `?Send` async traits so that browser futures (which are
//! not `Send`) can implement them.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::codec;
use crate::config::{AttestationPreference, UserVerificationRequirement};
use crate::cose::CoseAlgorithm;
use crate::documents::{
    CeremonyResult, CredentialDocument, CredentialResponseDocument, OptionsDocument,
    RelyingPartyEntity, PUBLIC_KEY_CREDENTIAL_TYPE,
};
use crate::error::{CeremonyError, CodecError, Result};

/// Decoded `PublicKeyCredentialCreationOptions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformCreationRequest {
    pub challenge: Vec<u8>,
    pub rp: RelyingPartyEntity,
    pub user_id: Vec<u8>,
    pub user_name: String,
    pub user_display_name: String,
    pub algorithms: Vec<CoseAlgorithm>,
    pub timeout_ms: u64,
    pub attestation: AttestationPreference,
    pub require_resident_key: bool,
    pub resident_key: String,
    pub user_verification: UserVerificationRequirement,
}

/// Decoded `PublicKeyCredentialRequestOptions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformAssertionRequest {
    pub challenge: Vec<u8>,
    pub rp_id: String,
    pub timeout_ms: u64,
    pub user_verification: UserVerificationRequirement,
    pub allow_credentials: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformRequest {
    Create(PlatformCreationRequest),
    Get(PlatformAssertionRequest),
}

/// A credential as returned by the platform, binary members raw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformCredential {
    /// Platform-reported id string, forwarded verbatim.
    pub id: String,
    pub kind: String,
    pub authenticator_attachment: Option<String>,
    pub client_data_json: Vec<u8>,
    pub attestation_object: Option<Vec<u8>>,
    pub authenticator_data: Option<Vec<u8>>,
    pub signature: Option<Vec<u8>>,
    pub user_handle: Option<Vec<u8>>,
}

/// Decode the transport-encoded members of a server option document.
pub fn build_options(document: &OptionsDocument) -> std::result::Result<PlatformRequest, CodecError> {
    match document {
        OptionsDocument::Registration(o) => Ok(PlatformRequest::Create(PlatformCreationRequest {
            challenge: codec::decode_field("challenge", &o.challenge)?,
            rp: o.rp.clone(),
            user_id: codec::decode_field("user.id", &o.user.id)?,
            user_name: o.user.name.clone(),
            user_display_name: o.user.display_name.clone(),
            algorithms: o.pub_key_cred_params.iter().map(|p| p.alg).collect(),
            timeout_ms: o.timeout,
            attestation: o.attestation,
            require_resident_key: o.authenticator_selection.require_resident_key,
            resident_key: o.authenticator_selection.resident_key.clone(),
            user_verification: o.authenticator_selection.user_verification,
        })),
        OptionsDocument::Authentication(o) => Ok(PlatformRequest::Get(PlatformAssertionRequest {
            challenge: codec::decode_field("challenge", &o.challenge)?,
            rp_id: o.rp_id.clone(),
            timeout_ms: o.timeout,
            user_verification: o.user_verification,
            allow_credentials: o
                .allow_credentials
                .iter()
                .map(|c| codec::decode_field("allowCredentials.id", &c.id))
                .collect::<std::result::Result<_, _>>()?,
        })),
    }
}

/// Encode a platform credential for transport; absent members stay absent.
pub fn package_credential(credential: &PlatformCredential) -> CredentialDocument {
    CredentialDocument {
        id: credential.id.clone(),
        kind: if credential.kind.is_empty() {
            PUBLIC_KEY_CREDENTIAL_TYPE.to_string()
        } else {
            credential.kind.clone()
        },
        authenticator_attachment: credential.authenticator_attachment.clone(),
        response: CredentialResponseDocument {
            attestation_object: codec::encode_opt(credential.attestation_object.as_deref()),
            authenticator_data: codec::encode_opt(credential.authenticator_data.as_deref()),
            client_data_json: codec::encode(&credential.client_data_json),
            signature: codec::encode_opt(credential.signature.as_deref()),
            user_handle: codec::encode_opt(credential.user_handle.as_deref()),
        },
    }
}

/// The platform credential API (`navigator.credentials` or a software token).
///
/// A user-dismissed prompt must surface as [`CeremonyError::UserCancelled`].
#[async_trait(?Send)]
pub trait PlatformAuthenticator {
    async fn create(&self, request: &PlatformCreationRequest) -> Result<PlatformCredential>;
    async fn get(&self, request: &PlatformAssertionRequest) -> Result<PlatformCredential>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A server endpoint taking part in a ceremony.
///
/// Requests carry `Accept: application/json`, plus `Content-Type:
/// application/json` when they have a body. Extra `headers` (CSRF tokens,
/// authorization) are added on top and replace a default of the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

const JSON: &str = "application/json";

impl Endpoint {
    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Option endpoints default to GET.
    pub fn options(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Credential endpoints default to POST.
    pub fn credential(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a header, replacing an earlier one with the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Headers a transport sends for this endpoint.
    pub fn request_headers(&self, has_body: bool) -> Vec<(String, String)> {
        let mut headers = vec![("Accept".to_string(), JSON.to_string())];
        if has_body {
            headers.push(("Content-Type".to_string(), JSON.to_string()));
        }
        for (name, value) in &self.headers {
            headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }
        headers
    }
}

/// JSON request/response transport to the relying party.
///
/// Non-2xx responses must be reported as [`CeremonyError::Transport`].
#[async_trait(?Send)]
pub trait CeremonyTransport {
    async fn send(
        &self,
        endpoint: &Endpoint,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value>;
}

/// Runs the fetch → platform → submit flow.
pub struct CeremonyDriver<T, P> {
    transport: T,
    platform: P,
}

impl<T: CeremonyTransport, P: PlatformAuthenticator> CeremonyDriver<T, P> {
    pub fn new(transport: T, platform: P) -> Self {
        Self {
            transport,
            platform,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn into_parts(self) -> (T, P) {
        (self.transport, self.platform)
    }

    /// Create a new credential.
    pub async fn register(&self, options: &Endpoint, credential: &Endpoint) -> Result<CeremonyResult> {
        let request = match self.fetch_request(options).await? {
            PlatformRequest::Create(request) => request,
            PlatformRequest::Get(_) => {
                return Err(CeremonyError::InvalidRequest(
                    "server returned authentication options to a registration".into(),
                ))
            }
        };
        tracing::debug!(rp = %request.rp.id, user = %request.user_name, "Creating credential");
        let created = self.platform.create(&request).await?;
        self.submit(credential, &created).await
    }

    /// Assert an existing credential.
    pub async fn authenticate(
        &self,
        options: &Endpoint,
        credential: &Endpoint,
    ) -> Result<CeremonyResult> {
        let request = match self.fetch_request(options).await? {
            PlatformRequest::Get(request) => request,
            PlatformRequest::Create(_) => {
                return Err(CeremonyError::InvalidRequest(
                    "server returned registration options to an authentication".into(),
                ))
            }
        };
        tracing::debug!(rp = %request.rp_id, "Requesting assertion");
        let asserted = self.platform.get(&request).await?;
        self.submit(credential, &asserted).await
    }

    async fn fetch_request(&self, endpoint: &Endpoint) -> Result<PlatformRequest> {
        let value = self.transport.send(endpoint, None).await?;
        let document: OptionsDocument = from_response(value)?;
        Ok(build_options(&document)?)
    }

    async fn submit(&self, endpoint: &Endpoint, credential: &PlatformCredential) -> Result<CeremonyResult> {
        let document = package_credential(credential);
        let body = serde_json::to_value(&document)
            .map_err(|e| CeremonyError::Transport(format!("cannot encode credential: {e}")))?;
        let value = self.transport.send(endpoint, Some(&body)).await?;
        from_response(value)
    }
}

fn from_response<D: DeserializeOwned>(value: serde_json::Value) -> Result<D> {
    serde_json::from_value(value)
        .map_err(|e| CeremonyError::Transport(format!("unexpected response body: {e}")))
}
