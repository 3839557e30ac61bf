//! `fetch` as a [`CeremonyTransport`].
//!
//! Requests include credentials so the relying party's session cookie
//! travels with both halves of a ceremony.

use async_trait::async_trait;
use passgate_core::{CeremonyError, CeremonyTransport, Endpoint, Result};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestCredentials, RequestInit, Response, Window};

pub struct FetchTransport {
    window: Window,
}

impl FetchTransport {
    pub fn new() -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| CeremonyError::Transport("no window available".into()))?;
        Ok(Self { window })
    }
}

#[async_trait(?Send)]
impl CeremonyTransport for FetchTransport {
    async fn send(
        &self,
        endpoint: &Endpoint,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let init = RequestInit::new();
        init.set_method(endpoint.method.as_str());
        init.set_credentials(RequestCredentials::Include);
        if let Some(body) = body {
            let json = serde_json::to_string(body)
                .map_err(|e| CeremonyError::Transport(format!("cannot encode body: {e}")))?;
            init.set_body(&JsValue::from_str(&json));
        }

        let request = Request::new_with_str_and_init(&endpoint.url, &init).map_err(fetch_error)?;
        let headers = request.headers();
        for (name, value) in endpoint.request_headers(body.is_some()) {
            headers.set(&name, &value).map_err(fetch_error)?;
        }

        let response = JsFuture::from(self.window.fetch_with_request(&request))
            .await
            .map_err(|e| CeremonyError::Transport(format!("server unavailable: {}", describe(&e))))?;
        let response: Response = response.dyn_into().map_err(fetch_error)?;

        let text = JsFuture::from(response.text().map_err(fetch_error)?)
            .await
            .map_err(fetch_error)?
            .as_string()
            .unwrap_or_default();

        if !response.ok() {
            return Err(CeremonyError::Transport(format!(
                "unexpected HTTP {} status",
                response.status()
            )));
        }
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| CeremonyError::Transport(format!("unexpected response body: {e}")))
    }
}

fn fetch_error(err: JsValue) -> CeremonyError {
    CeremonyError::Transport(describe(&err))
}

fn describe(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| {
            err.dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| "fetch failed".into())
}
