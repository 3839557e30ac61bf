//! Passgate Server - WebAuthn relying party over HTTP
//!
//! Exposes the passgate-core ceremonies via HTTP endpoints:
//! - GET  /webauthn/register/{name} - Registration options
//! - POST /webauthn/register        - Complete registration
//! - GET  /webauthn/authenticate    - Authentication options
//! - POST /webauthn/authenticate    - Complete authentication

use std::net::SocketAddr;

use anyhow::Context;
use passgate_server::{create_router_with_state, storage, AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,passgate_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let store = storage::credential_store(&config)
        .await
        .context("Failed to initialize credential storage")?;
    let state = AppState::from_config(&config, store).context("Invalid relying party settings")?;

    tracing::info!(
        rp_id = %state.orchestrator.config().relying_party_id(),
        origin = %state.orchestrator.config().origin(),
        "Relying party configured"
    );

    let app = create_router_with_state(&config, state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    println!("╔════════════════════════════════════════════╗");
    println!("║          PASSGATE Server v{:<17}║", env!("CARGO_PKG_VERSION"));
    println!("║      WebAuthn Relying Party over HTTP      ║");
    println!("╚════════════════════════════════════════════╝");
    println!("\nListening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /webauthn/register/{{name}} - Registration options");
    println!("  POST /webauthn/register        - Complete registration");
    println!("  GET  /webauthn/authenticate    - Authentication options");
    println!("  POST /webauthn/authenticate    - Complete authentication");
    println!("  GET  /webauthn/session         - Session ceremony state");
    println!("  POST /webauthn/logout          - Clear session");
    println!("  GET  /swagger-ui               - API documentation");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        // Without a signal handler, serve until the process is killed
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
