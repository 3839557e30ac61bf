//! API integration tests for passgate-server.
//!
//! These tests drive the router in-process, carry the session cookie
//! between requests like a browser would, and use the software
//! authenticator so every credential carries a real signature.

use std::cell::RefCell;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use passgate_core::{
    build_options, package_credential, CeremonyDriver, CeremonyError, CeremonyTransport,
    CredentialStore, Endpoint, MemoryCredentialStore, OptionsDocument, PlatformAuthenticator,
    PlatformRequest, SoftToken,
};
use passgate_server::{create_router, create_router_with_state, AppState, Config};
use serde_json::Value;
use tower::ServiceExt;

const ORIGIN: &str = "http://localhost:3000";

/// Build the test router using the library's create_router function
fn create_test_app() -> Router {
    create_router().unwrap()
}

/// Router over a caller-provided credential store
fn create_app_with_store(store: Arc<dyn CredentialStore>) -> Router {
    let config = Config::default();
    let state = AppState::from_config(&config, store).unwrap();
    create_router_with_state(&config, state)
}

/// Browser stand-in: one cookie jar per client.
struct TestClient {
    app: Router,
    cookie: RefCell<Option<String>>,
}

impl TestClient {
    fn new(app: Router) -> Self {
        Self {
            app,
            cookie: RefCell::new(None),
        }
    }

    async fn request(&self, method: &str, uri: &str, body: Option<&Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = self.cookie.borrow().as_ref() {
            builder = builder.header(header::COOKIE, cookie.as_str());
        }
        let request = match body {
            Some(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(value).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie
                .to_str()
                .unwrap()
                .split(';')
                .next()
                .unwrap()
                .to_string();
            *self.cookie.borrow_mut() = Some(pair);
        }

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request("GET", uri, None).await
    }

    async fn post(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(body)).await
    }
}

#[async_trait(?Send)]
impl CeremonyTransport for &TestClient {
    async fn send(
        &self,
        endpoint: &Endpoint,
        body: Option<&Value>,
    ) -> passgate_core::Result<Value> {
        let (status, json) = self.request(endpoint.method.as_str(), &endpoint.url, body).await;
        if !status.is_success() {
            return Err(CeremonyError::Transport(format!(
                "unexpected HTTP {} status",
                status.as_u16()
            )));
        }
        Ok(json)
    }
}

/// Fetch options from `uri` and let `token` produce a credential document,
/// without submitting it.
async fn prepare_credential(client: &TestClient, token: &SoftToken, uri: &str) -> Value {
    let (status, options) = client.get(uri).await;
    assert_eq!(status, StatusCode::OK, "options request failed: {options}");

    let document: OptionsDocument = serde_json::from_value(options).unwrap();
    let credential = match build_options(&document).unwrap() {
        PlatformRequest::Create(request) => token.create(&request).await.unwrap(),
        PlatformRequest::Get(request) => token.get(&request).await.unwrap(),
    };
    serde_json::to_value(package_credential(&credential)).unwrap()
}

async fn register(client: &TestClient, token: SoftToken, name: &str) -> SoftToken {
    let driver = CeremonyDriver::new(client, token);
    let result = driver
        .register(
            &Endpoint::options(format!("/webauthn/register/{name}")),
            &Endpoint::credential("/webauthn/register"),
        )
        .await
        .unwrap();
    assert_eq!(result.name, name);
    driver.into_parts().1
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let client = TestClient::new(create_test_app());

    let (status, json) = client.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "passgate-server");
    assert_eq!(json["persistent_store"], false);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint_returns_ok() {
    let client = TestClient::new(create_test_app());

    let (status, json) = client.get("/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
}

#[tokio::test]
async fn test_openapi_document_lists_ceremony_routes() {
    let client = TestClient::new(create_test_app());

    let (status, json) = client.get("/api-docs/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    let paths = json["paths"].as_object().unwrap();
    assert!(paths.contains_key("/webauthn/register/{name}"));
    assert!(paths.contains_key("/webauthn/authenticate"));
}

// ============================================================================
// Option Document Tests
// ============================================================================

#[tokio::test]
async fn test_registration_options_shape() {
    let client = TestClient::new(create_test_app());

    let (status, json) = client
        .get("/webauthn/register/alice?display_name=Alice%20Liddell")
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rp"]["id"], "localhost");
    assert_eq!(json["rp"]["name"], "Passgate");
    assert_eq!(json["user"]["name"], "alice");
    assert_eq!(json["user"]["displayName"], "Alice Liddell");
    assert_eq!(json["pubKeyCredParams"][0]["alg"], -7);
    assert_eq!(json["pubKeyCredParams"][1]["alg"], -257);
    assert_eq!(json["authenticatorSelection"]["requireResidentKey"], true);

    // 32 random bytes, unpadded base64url
    let challenge = json["challenge"].as_str().unwrap();
    assert_eq!(challenge.len(), 43);
    assert!(!challenge.contains('='));
}

#[tokio::test]
async fn test_registration_rejects_oversized_name() {
    let client = TestClient::new(create_test_app());
    let name = "n".repeat(65);

    let (status, json) = client.get(&format!("/webauthn/register/{name}")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_session_reports_pending_offer() {
    let client = TestClient::new(create_test_app());

    client.get("/webauthn/authenticate").await;
    let (status, json) = client.get("/webauthn/session").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["phase"], "offer_issued");
    assert_eq!(json["ceremony"], "authentication");
    assert_eq!(json["authenticated"], false);
}

// ============================================================================
// Ceremony Flow Tests
// ============================================================================

#[tokio::test]
async fn test_register_then_login() {
    let client = TestClient::new(create_test_app());

    let token = register(&client, SoftToken::new(ORIGIN), "alice").await;

    let (_, session) = client.get("/webauthn/session").await;
    assert_eq!(session["phase"], "completed");
    assert_eq!(session["user"]["name"], "alice");

    let (status, _) = client.post("/webauthn/logout", &Value::Null).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let driver = CeremonyDriver::new(&client, token);
    let result = driver
        .authenticate(
            &Endpoint::options("/webauthn/authenticate"),
            &Endpoint::credential("/webauthn/authenticate"),
        )
        .await
        .unwrap();
    assert_eq!(result.name, "alice");

    let (_, session) = client.get("/webauthn/session").await;
    assert_eq!(session["authenticated"], true);
}

#[tokio::test]
async fn test_logout_clears_session() {
    let client = TestClient::new(create_test_app());
    register(&client, SoftToken::new(ORIGIN), "bob").await;

    let (status, _) = client.post("/webauthn/logout", &Value::Null).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, session) = client.get("/webauthn/session").await;
    assert_eq!(session["phase"], "idle");
    assert_eq!(session["authenticated"], false);
    assert!(session.get("user").is_none());
}

#[tokio::test]
async fn test_counterless_authenticator_logs_in_repeatedly() {
    let client = TestClient::new(create_test_app());
    let token = register(&client, SoftToken::new(ORIGIN).without_counters(), "carol").await;

    let driver = CeremonyDriver::new(&client, token);
    for _ in 0..3 {
        driver
            .authenticate(
                &Endpoint::options("/webauthn/authenticate"),
                &Endpoint::credential("/webauthn/authenticate"),
            )
            .await
            .unwrap();
    }
}

// ============================================================================
// Rejection Tests
// ============================================================================

#[tokio::test]
async fn test_complete_without_offer_is_rejected() {
    let client = TestClient::new(create_test_app());
    let token = SoftToken::new(ORIGIN);

    // Obtain a valid credential on another session
    let other = TestClient::new(create_test_app());
    let credential = prepare_credential(&other, &token, "/webauthn/register/dave").await;

    let (status, json) = client.post("/webauthn/register", &credential).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "NO_PENDING_CHALLENGE");
}

#[tokio::test]
async fn test_replayed_credential_is_rejected() {
    let client = TestClient::new(create_test_app());
    let token = SoftToken::new(ORIGIN);

    let credential = prepare_credential(&client, &token, "/webauthn/register/erin").await;

    let (status, json) = client.post("/webauthn/register", &credential).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "erin");

    let (status, json) = client.post("/webauthn/register", &credential).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "NO_PENDING_CHALLENGE");
}

#[tokio::test]
async fn test_registration_challenge_cannot_complete_login() {
    let client = TestClient::new(create_test_app());
    let token = SoftToken::new(ORIGIN);

    let credential = prepare_credential(&client, &token, "/webauthn/register/frank").await;

    let (status, json) = client.post("/webauthn/authenticate", &credential).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "NO_PENDING_CHALLENGE");

    // The mismatched attempt consumed the challenge
    let (status, json) = client.post("/webauthn/register", &credential).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "NO_PENDING_CHALLENGE");
}

#[tokio::test]
async fn test_malformed_encoding_is_rejected() {
    let client = TestClient::new(create_test_app());
    let token = SoftToken::new(ORIGIN);

    let mut credential = prepare_credential(&client, &token, "/webauthn/register/gina").await;
    credential["response"]["clientDataJSON"] = Value::from("not+base64url==");

    let (status, json) = client.post("/webauthn/register", &credential).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "MALFORMED_ENCODING");
}

#[tokio::test]
async fn test_unknown_credential_and_bad_signature_are_indistinguishable() {
    let client = TestClient::new(create_test_app());
    let token = register(&client, SoftToken::new(ORIGIN), "heidi").await;

    // Bad signature against the server that knows the credential
    let mut assertion = prepare_credential(&client, &token, "/webauthn/authenticate").await;
    let signature = assertion["response"]["signature"].as_str().unwrap().to_string();
    let mut tampered: Vec<char> = signature.chars().collect();
    let middle = tampered.len() / 2;
    tampered[middle] = if tampered[middle] == 'A' { 'B' } else { 'A' };
    assertion["response"]["signature"] = Value::from(tampered.into_iter().collect::<String>());
    let (bad_signature_status, bad_signature_body) =
        client.post("/webauthn/authenticate", &assertion).await;

    // Valid assertion against a server that never saw the user handle
    let stranger = TestClient::new(create_test_app());
    let assertion = prepare_credential(&stranger, &token, "/webauthn/authenticate").await;
    let (unknown_status, unknown_body) = stranger.post("/webauthn/authenticate", &assertion).await;

    assert_eq!(bad_signature_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(bad_signature_body, unknown_body);
    assert_eq!(unknown_body["code"], "AUTHENTICATION_FAILED");
}

#[tokio::test]
async fn test_cloned_authenticator_is_rejected() {
    let client = TestClient::new(create_test_app());
    let token = register(&client, SoftToken::new(ORIGIN), "ivan").await;
    let clone = SoftToken::from_json(&token.to_json().unwrap()).unwrap();

    let assertion = prepare_credential(&client, &token, "/webauthn/authenticate").await;
    let (status, _) = client.post("/webauthn/authenticate", &assertion).await;
    assert_eq!(status, StatusCode::OK);

    // The clone reports the same counter value the original just used
    let assertion = prepare_credential(&client, &clone, "/webauthn/authenticate").await;
    let (status, json) = client.post("/webauthn/authenticate", &assertion).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "AUTHENTICATION_FAILED");

    let (_, session) = client.get("/webauthn/session").await;
    assert_eq!(session["authenticated"], false);
}

#[tokio::test]
async fn test_wrong_origin_fails_registration_without_storing() {
    let store = Arc::new(MemoryCredentialStore::new());
    let client = TestClient::new(create_app_with_store(store.clone()));
    let token = SoftToken::new("https://evil.example");

    let credential = prepare_credential(&client, &token, "/webauthn/register/judy").await;
    let (status, json) = client.post("/webauthn/register", &credential).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "REGISTRATION_FAILED");
    assert!(store.is_empty());
}
