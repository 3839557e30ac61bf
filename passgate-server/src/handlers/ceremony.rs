//! WebAuthn ceremony endpoint handlers
//!
//! Each handler locks the caller's session, runs one orchestrator step
//! against the stored ceremony state and writes the state back. The state
//! is committed even when the step fails: a failed completion has consumed
//! its challenge and must not be replayable.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use passgate_core::{
    AuthenticationOptions, CeremonyPhase, CeremonyResult, CredentialDocument, RegistrationOptions,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::session::CeremonySession;
use crate::state::AppState;

/// Query parameters for a registration offer
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RegisterQuery {
    /// Human-friendly name shown by the authenticator (default: empty)
    pub display_name: Option<String>,
}

/// Ceremony state of the caller's session
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    /// `idle`, `offer_issued` or `completed`
    #[schema(value_type = String)]
    pub phase: &'static str,
    /// Ceremony awaiting completion, when an offer is outstanding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ceremony: Option<String>,
    pub authenticated: bool,
    /// Authenticated user, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub user: Option<CeremonyResult>,
}

/// GET /webauthn/register/{name}
///
/// Issue registration options for a new user and bind the challenge to the
/// session.
#[utoipa::path(
    get,
    path = "/webauthn/register/{name}",
    tag = "WebAuthn",
    params(
        ("name" = String, Path, description = "User name (1 to 64 bytes)"),
        RegisterQuery
    ),
    responses(
        (status = 200, description = "PublicKeyCredentialCreationOptions with base64url binary members"),
        (status = 400, description = "Invalid user name")
    )
)]
pub async fn offer_registration(
    State(state): State<AppState>,
    session: Session,
    Path(name): Path<String>,
    Query(query): Query<RegisterQuery>,
) -> Result<Json<RegistrationOptions>, ApiError> {
    let mut ceremony = CeremonySession::acquire(state.locks.clone(), session).await?;
    let options = state.orchestrator.offer_registration(
        ceremony.state(),
        &name,
        query.display_name.as_deref(),
    );
    ceremony.commit().await?;

    let options = options?;
    tracing::info!(user = %options.user.name, "WebAuthn registration offered");
    Ok(Json(options))
}

/// POST /webauthn/register
///
/// Complete registration with the credential created by the authenticator.
#[utoipa::path(
    post,
    path = "/webauthn/register",
    tag = "WebAuthn",
    request_body(content_type = "application/json", description = "PublicKeyCredential with base64url binary members"),
    responses(
        (status = 200, description = "Registration completed; session is authenticated"),
        (status = 400, description = "No pending challenge, expired challenge or malformed encoding"),
        (status = 401, description = "Registration failed")
    )
)]
pub async fn complete_registration(
    State(state): State<AppState>,
    session: Session,
    Json(credential): Json<CredentialDocument>,
) -> Result<Json<CeremonyResult>, ApiError> {
    let mut ceremony = CeremonySession::acquire(state.locks.clone(), session).await?;
    let result = state
        .orchestrator
        .complete_registration(ceremony.state(), &credential)
        .await;
    ceremony.commit().await?;

    Ok(Json(result?))
}

/// GET /webauthn/authenticate
///
/// Issue authentication options. Credentials are discoverable, so no user
/// name is needed.
#[utoipa::path(
    get,
    path = "/webauthn/authenticate",
    tag = "WebAuthn",
    responses(
        (status = 200, description = "PublicKeyCredentialRequestOptions with base64url binary members")
    )
)]
pub async fn offer_authentication(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<AuthenticationOptions>, ApiError> {
    let mut ceremony = CeremonySession::acquire(state.locks.clone(), session).await?;
    let options = state.orchestrator.offer_authentication(ceremony.state());
    ceremony.commit().await?;

    tracing::info!("WebAuthn authentication offered");
    Ok(Json(options?))
}

/// POST /webauthn/authenticate
///
/// Complete authentication with an assertion.
#[utoipa::path(
    post,
    path = "/webauthn/authenticate",
    tag = "WebAuthn",
    request_body(content_type = "application/json", description = "PublicKeyCredential assertion with base64url binary members"),
    responses(
        (status = 200, description = "Authentication completed; session is authenticated"),
        (status = 400, description = "No pending challenge, expired challenge or malformed encoding"),
        (status = 401, description = "Authentication failed")
    )
)]
pub async fn complete_authentication(
    State(state): State<AppState>,
    session: Session,
    Json(credential): Json<CredentialDocument>,
) -> Result<Json<CeremonyResult>, ApiError> {
    let mut ceremony = CeremonySession::acquire(state.locks.clone(), session).await?;
    let result = state
        .orchestrator
        .complete_authentication(ceremony.state(), &credential)
        .await;
    ceremony.commit().await?;

    Ok(Json(result?))
}

/// GET /webauthn/session
///
/// Report the ceremony phase and authenticated user of this session.
#[utoipa::path(
    get,
    path = "/webauthn/session",
    tag = "WebAuthn",
    responses(
        (status = 200, description = "Session ceremony state", body = SessionResponse)
    )
)]
pub async fn current_session(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<SessionResponse>, ApiError> {
    let mut ceremony = CeremonySession::acquire(state.locks.clone(), session).await?;
    let current = ceremony.state();

    let (phase, kind) = match current.phase() {
        CeremonyPhase::Idle => ("idle", None),
        CeremonyPhase::OfferIssued(kind) => ("offer_issued", Some(kind.to_string())),
        CeremonyPhase::Completed => ("completed", None),
    };

    Ok(Json(SessionResponse {
        phase,
        ceremony: kind,
        authenticated: current.is_authenticated(),
        user: current.authenticated_user(),
    }))
}

/// POST /webauthn/logout
///
/// Forget the pending challenge and the authenticated user.
#[utoipa::path(
    post,
    path = "/webauthn/logout",
    tag = "WebAuthn",
    responses(
        (status = 204, description = "Session cleared")
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
) -> Result<StatusCode, ApiError> {
    let mut ceremony = CeremonySession::acquire(state.locks.clone(), session).await?;
    state.orchestrator.logout(ceremony.state());
    ceremony.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}
