//! `navigator.credentials` as a [`PlatformAuthenticator`].

use async_trait::async_trait;
use js_sys::{Array, Object, Reflect, Uint8Array};
use passgate_core::{
    CeremonyError, PlatformAssertionRequest, PlatformAuthenticator, PlatformCreationRequest,
    PlatformCredential, Result,
};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    CredentialCreationOptions, CredentialRequestOptions, CredentialsContainer, DomException,
};

/// The browser's WebAuthn API.
pub struct BrowserPlatform {
    credentials: CredentialsContainer,
}

impl BrowserPlatform {
    pub fn new() -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| CeremonyError::Platform("no window available".into()))?;
        Ok(Self {
            credentials: window.navigator().credentials(),
        })
    }
}

#[async_trait(?Send)]
impl PlatformAuthenticator for BrowserPlatform {
    async fn create(&self, request: &PlatformCreationRequest) -> Result<PlatformCredential> {
        let options: CredentialCreationOptions = wrap_public_key(creation_options(request)?)?;
        let promise = self
            .credentials
            .create_with_options(&options)
            .map_err(platform_error)?;
        let credential = JsFuture::from(promise).await.map_err(platform_error)?;
        read_credential(&credential)
    }

    async fn get(&self, request: &PlatformAssertionRequest) -> Result<PlatformCredential> {
        let options: CredentialRequestOptions = wrap_public_key(request_options(request)?)?;
        let promise = self
            .credentials
            .get_with_options(&options)
            .map_err(platform_error)?;
        let credential = JsFuture::from(promise).await.map_err(platform_error)?;
        read_credential(&credential)
    }
}

fn creation_options(request: &PlatformCreationRequest) -> Result<Object> {
    let rp = Object::new();
    set(&rp, "id", &request.rp.id.as_str().into())?;
    set(&rp, "name", &request.rp.name.as_str().into())?;

    let user = Object::new();
    set(&user, "id", &bytes(&request.user_id))?;
    set(&user, "name", &request.user_name.as_str().into())?;
    set(&user, "displayName", &request.user_display_name.as_str().into())?;

    let params = Array::new();
    for alg in &request.algorithms {
        let param = Object::new();
        set(&param, "type", &"public-key".into())?;
        set(&param, "alg", &JsValue::from_f64(alg.id() as f64))?;
        params.push(&param);
    }

    let selection = Object::new();
    set(&selection, "requireResidentKey", &request.require_resident_key.into())?;
    set(&selection, "residentKey", &request.resident_key.as_str().into())?;
    set(
        &selection,
        "userVerification",
        &request.user_verification.as_str().into(),
    )?;

    let public_key = Object::new();
    set(&public_key, "challenge", &bytes(&request.challenge))?;
    set(&public_key, "rp", &rp)?;
    set(&public_key, "user", &user)?;
    set(&public_key, "pubKeyCredParams", &params)?;
    set(&public_key, "timeout", &JsValue::from_f64(request.timeout_ms as f64))?;
    set(&public_key, "attestation", &request.attestation.as_str().into())?;
    set(&public_key, "authenticatorSelection", &selection)?;
    Ok(public_key)
}

fn request_options(request: &PlatformAssertionRequest) -> Result<Object> {
    let allow = Array::new();
    for id in &request.allow_credentials {
        let descriptor = Object::new();
        set(&descriptor, "type", &"public-key".into())?;
        set(&descriptor, "id", &bytes(id))?;
        allow.push(&descriptor);
    }

    let public_key = Object::new();
    set(&public_key, "challenge", &bytes(&request.challenge))?;
    set(&public_key, "rpId", &request.rp_id.as_str().into())?;
    set(&public_key, "timeout", &JsValue::from_f64(request.timeout_ms as f64))?;
    set(
        &public_key,
        "userVerification",
        &request.user_verification.as_str().into(),
    )?;
    set(&public_key, "allowCredentials", &allow)?;
    Ok(public_key)
}

/// `{ publicKey: ... }`, typed as the web-sys dictionary.
fn wrap_public_key<T: JsCast>(public_key: Object) -> Result<T> {
    let options = Object::new();
    set(&options, "publicKey", &public_key)?;
    Ok(options.unchecked_into())
}

fn read_credential(credential: &JsValue) -> Result<PlatformCredential> {
    if credential.is_null() || credential.is_undefined() {
        return Err(CeremonyError::UserCancelled);
    }
    let response = get(credential, "response")?;

    Ok(PlatformCredential {
        id: get(credential, "id")?.as_string().unwrap_or_default(),
        kind: get(credential, "type")?.as_string().unwrap_or_default(),
        authenticator_attachment: get(credential, "authenticatorAttachment")?.as_string(),
        client_data_json: buffer(&get(&response, "clientDataJSON")?).unwrap_or_default(),
        attestation_object: buffer(&get(&response, "attestationObject")?),
        authenticator_data: buffer(&get(&response, "authenticatorData")?),
        signature: buffer(&get(&response, "signature")?),
        user_handle: buffer(&get(&response, "userHandle")?),
    })
}

fn bytes(data: &[u8]) -> JsValue {
    Uint8Array::from(data).into()
}

/// Copy an `ArrayBuffer` member; absent or null members stay absent.
fn buffer(value: &JsValue) -> Option<Vec<u8>> {
    if value.is_null() || value.is_undefined() {
        return None;
    }
    Some(Uint8Array::new(value).to_vec())
}

fn set(target: &Object, key: &str, value: &JsValue) -> Result<()> {
    Reflect::set(target, &key.into(), value)
        .map(|_| ())
        .map_err(platform_error)
}

fn get(target: &JsValue, key: &str) -> Result<JsValue> {
    Reflect::get(target, &key.into()).map_err(platform_error)
}

/// A dismissed or timed-out prompt rejects with `NotAllowedError`.
fn platform_error(err: JsValue) -> CeremonyError {
    if let Some(exception) = err.dyn_ref::<DomException>() {
        return match exception.name().as_str() {
            "NotAllowedError" | "AbortError" => CeremonyError::UserCancelled,
            name => CeremonyError::Platform(format!("{name}: {}", exception.message())),
        };
    }
    CeremonyError::Platform(
        err.as_string()
            .unwrap_or_else(|| "credential request failed".into()),
    )
}
