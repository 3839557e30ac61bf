//! WebAssembly bindings for Passgate ceremonies.
//!
//! Runs the client ceremony driver in the browser: option documents are
//! fetched from the relying party, handed to `navigator.credentials`, and
//! the resulting credential is posted back with binary members encoded
//! as base64url.

use passgate_core::{codec, CeremonyDriver, CeremonyError, CeremonyResult, Endpoint};
use serde::Serialize;
use wasm_bindgen::prelude::*;

mod platform;
mod transport;

pub use platform::BrowserPlatform;
pub use transport::FetchTransport;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Outcome of a ceremony, serialized to JSON for the caller.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CeremonyOutcome {
    /// Whether the relying party accepted the credential
    pub ok: bool,
    /// The user dismissed the browser prompt
    pub cancelled: bool,
    /// Identity returned by the relying party
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<CeremonyResult>,
    /// Error message if the ceremony failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CeremonyOutcome {
    fn from_result(result: Result<CeremonyResult, CeremonyError>) -> Self {
        match result {
            Ok(user) => Self {
                ok: true,
                cancelled: false,
                user: Some(user),
                error: None,
            },
            Err(err) => Self {
                ok: false,
                cancelled: matches!(err, CeremonyError::UserCancelled),
                user: None,
                error: Some(err.to_string()),
            },
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"ok":false,"cancelled":false,"error":"Serialization error: {e}"}}"#)
        })
    }
}

fn driver() -> Result<CeremonyDriver<FetchTransport, BrowserPlatform>, CeremonyError> {
    Ok(CeremonyDriver::new(
        FetchTransport::new()?,
        BrowserPlatform::new()?,
    ))
}

/// Register a new passkey.
///
/// # Arguments
/// * `options_url` - GET endpoint returning creation options
/// * `credential_url` - POST endpoint accepting the new credential
///
/// # Returns
/// A JSON string with `ok`, `cancelled`, `user` and `error` members
#[wasm_bindgen]
pub async fn register(options_url: String, credential_url: String) -> String {
    let result = match driver() {
        Ok(driver) => {
            driver
                .register(
                    &Endpoint::options(options_url),
                    &Endpoint::credential(credential_url),
                )
                .await
        }
        Err(err) => Err(err),
    };
    CeremonyOutcome::from_result(result).to_json()
}

/// Log in with a discoverable passkey.
///
/// Same arguments and result as [`register`].
#[wasm_bindgen]
pub async fn authenticate(options_url: String, credential_url: String) -> String {
    let result = match driver() {
        Ok(driver) => {
            driver
                .authenticate(
                    &Endpoint::options(options_url),
                    &Endpoint::credential(credential_url),
                )
                .await
        }
        Err(err) => Err(err),
    };
    CeremonyOutcome::from_result(result).to_json()
}

/// Encode bytes as unpadded base64url (empty input gives an empty string).
#[wasm_bindgen]
pub fn encode_base64url(bytes: &[u8]) -> String {
    codec::encode(bytes).unwrap_or_default()
}

/// Decode an unpadded base64url string.
#[wasm_bindgen]
pub fn decode_base64url(encoded: &str) -> Result<Vec<u8>, JsError> {
    codec::decode(encoded).map_err(|e| JsError::new(&e.to_string()))
}

/// Get the library version.
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
