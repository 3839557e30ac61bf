//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document for the Passgate relying-party API.

use utoipa::OpenApi;

use crate::handlers::{HealthResponse, ReadyResponse, SessionResponse};

/// Passgate API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Passgate - WebAuthn Relying Party API",
        version = "0.1.0",
        description = r#"
## Passwordless registration and login with WebAuthn

Each ceremony is two requests on the same cookie session:

1. **Offer** - `GET` returns options with a fresh, single-use challenge
2. **Complete** - `POST` the credential produced by `navigator.credentials`

Binary members (challenge, user id, attestation object, signature...) are
unpadded base64url strings in both directions.

Challenges expire, cannot be replayed, and a registration challenge cannot
complete a login. Authenticator signature counters must increase between
logins; a regression is treated as a cloned authenticator.
"#,
        license(
            name = "MIT OR Apache-2.0",
            url = "https://github.com/passgate/passgate/blob/main/LICENSE"
        )
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "WebAuthn", description = "Registration and authentication ceremonies"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::ceremony::offer_registration,
        crate::handlers::ceremony::complete_registration,
        crate::handlers::ceremony::offer_authentication,
        crate::handlers::ceremony::complete_authentication,
        crate::handlers::ceremony::current_session,
        crate::handlers::ceremony::logout,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            SessionResponse,
        )
    )
)]
pub struct ApiDoc;
