//! Router assembly: ceremony and probe routes, sessions and middleware.

use std::{sync::Arc, time::Duration};

use axum::{
    http::{header, Method, StatusCode},
    routing::{get, post},
    Router,
};
use passgate_core::ConfigError;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::handlers::{
    complete_authentication, complete_registration, current_session, health, logout,
    offer_authentication, offer_registration, ready,
};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Session cookie name
pub const SESSION_COOKIE: &str = "passgate.sid";

/// Router over default settings and an in-memory credential store (tests)
pub fn create_router() -> Result<Router, ConfigError> {
    let config = Config::default();
    let state = AppState::in_memory(&config)?;
    Ok(create_router_with_state(&config, state))
}

/// Router over the given settings and state
pub fn create_router_with_state(config: &Config, state: AppState) -> Router {
    let webauthn = Router::new()
        .route("/webauthn/register/{name}", get(offer_registration))
        .route("/webauthn/register", post(complete_registration))
        .route(
            "/webauthn/authenticate",
            get(offer_authentication).post(complete_authentication),
        )
        .route("/webauthn/session", get(current_session))
        .route("/webauthn/logout", post(logout));

    let router = webauthn
        .route("/health", get(health))
        .route("/ready", get(ready))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(session_layer(config))
        .layer(cors_layer(config))
        .layer(RequestBodyLimitLayer::new(config.body_limit_kb * 1024))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.timeout_secs),
        ));

    with_rate_limit(router, config).layer(TraceLayer::new_for_http())
}

/// Ceremony state lives server-side; the cookie only carries the session id.
fn session_layer(config: &Config) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE)
        .with_secure(config.secure_cookies)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            config.session_ttl_minutes,
        )))
}

fn cors_layer(config: &Config) -> CorsLayer {
    match config.allowed_origins.as_deref() {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            tracing::info!(count = origins.len(), "CORS restricted to configured origins");
            // The session cookie must travel with cross-origin ceremonies
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
        }
        _ => {
            tracing::warn!("CORS open to any origin (dev mode)");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// Per-IP rate limiting; off by default so tests are not throttled.
fn with_rate_limit(router: Router, config: &Config) -> Router {
    if !config.rate_limit_enabled {
        tracing::warn!("Rate limiting disabled");
        return router;
    }

    let limits = GovernorConfigBuilder::default()
        .per_second(config.rate_limit_per_sec)
        .burst_size(config.rate_limit_burst)
        .finish();

    match limits {
        Some(limits) => {
            tracing::info!(
                per_sec = config.rate_limit_per_sec,
                burst = config.rate_limit_burst,
                "Rate limiting enabled"
            );
            router.layer(GovernorLayer::new(Arc::new(limits)))
        }
        None => {
            tracing::error!(
                per_sec = config.rate_limit_per_sec,
                burst = config.rate_limit_burst,
                "Invalid rate limit settings; rate limiting disabled"
            );
            router
        }
    }
}
