//! HTTP transport to a Passgate relying party.
//!
//! The server keeps ceremony state in a cookie session, so every request
//! goes through one cookie jar. The jar can be seeded from and exported to
//! the session file so that separate invocations share a session.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use passgate_core::{CeremonyError, CeremonyTransport, Endpoint, Method};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;
use tracing::debug;

pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
    jar: Arc<Jar>,
}

impl HttpTransport {
    /// Create a transport rooted at `base`, restoring `session` cookies.
    pub fn new(base: &Url, session: Option<&str>) -> Result<Self> {
        let base = normalize_base(base);
        let jar = Arc::new(Jar::default());
        if let Some(cookies) = session {
            for cookie in cookies.split(';').map(str::trim).filter(|c| !c.is_empty()) {
                jar.add_cookie_str(cookie, &base);
            }
        }

        let client = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .user_agent(concat!("passgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, base, jar })
    }

    /// Resolve a server-relative path against the base URL.
    pub fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .with_context(|| format!("Invalid endpoint path: {path}"))
    }

    /// Current session cookies as a `Cookie` header value.
    pub fn session_cookie(&self) -> Option<String> {
        self.jar
            .cookies(&self.base)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }
}

#[async_trait(?Send)]
impl CeremonyTransport for HttpTransport {
    async fn send(
        &self,
        endpoint: &Endpoint,
        body: Option<&serde_json::Value>,
    ) -> passgate_core::Result<serde_json::Value> {
        let request = self.request(endpoint, body)?;
        debug!(method = endpoint.method.as_str(), url = %request.url(), "Sending request");

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| CeremonyError::Transport(format!("server unavailable: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CeremonyError::Transport(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(CeremonyError::Transport(rejection_message(
                status.as_u16(),
                &text,
            )));
        }

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| CeremonyError::Transport(format!("unexpected response body: {e}")))
    }
}

impl HttpTransport {
    fn request(
        &self,
        endpoint: &Endpoint,
        body: Option<&serde_json::Value>,
    ) -> passgate_core::Result<reqwest::Request> {
        let url = self
            .base
            .join(&endpoint.url)
            .map_err(|e| CeremonyError::Transport(format!("invalid URL {}: {e}", endpoint.url)))?;

        let mut request = match endpoint.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        for (name, value) in endpoint.request_headers(body.is_some()) {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            let json = serde_json::to_vec(body)
                .map_err(|e| CeremonyError::Transport(format!("cannot encode body: {e}")))?;
            request = request.body(json);
        }
        request
            .build()
            .map_err(|e| CeremonyError::Transport(format!("invalid request: {e}")))
    }
}

/// Join needs a trailing slash to keep the last path segment.
fn normalize_base(base: &Url) -> Url {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

fn rejection_message(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string));
    match detail {
        Some(detail) => format!("unexpected HTTP {status} status: {detail}"),
        None => format!("unexpected HTTP {status} status"),
    }
}
