//! Logout command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use passgate_core::{CeremonyTransport, Endpoint};
use tracing::info;

use super::ClientContext;
use crate::utils;

/// Execute the logout command.
pub async fn execute(ctx: &ClientContext) -> Result<()> {
    let session_file = ctx.session_file();
    if utils::load_session(&session_file)?.is_none() {
        info!("No saved session");
        if !ctx.quiet {
            println!("{}", "No active session".dimmed());
        }
        return Ok(());
    }

    let transport = ctx.transport()?;
    let endpoint = Endpoint::credential(transport.url("webauthn/logout")?.as_str());
    transport
        .send(&endpoint, None)
        .await
        .context("Logout failed")?;

    utils::clear_session(&session_file)?;
    info!("Logged out");

    if !ctx.quiet {
        println!("{} {}", "✓".green().bold(), "Logged out".green().bold());
    }

    Ok(())
}
