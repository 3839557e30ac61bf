//! Login command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use passgate_core::{CeremonyDriver, Endpoint};
use tracing::info;

use super::ClientContext;
use crate::utils;

/// Execute the login command.
pub async fn execute(ctx: &ClientContext, user: Option<String>) -> Result<()> {
    let token = utils::load_token(&ctx.token_file)?;
    token.prefer_user(user);
    let transport = ctx.transport()?;
    let endpoint = transport.url("webauthn/authenticate")?;

    info!(server = %ctx.server, "Starting authentication");
    let driver = CeremonyDriver::new(transport, token);
    let outcome = driver
        .authenticate(
            &Endpoint::options(endpoint.as_str()),
            &Endpoint::credential(endpoint.as_str()),
        )
        .await;

    let (transport, token) = driver.into_parts();
    ctx.save_session(&transport)?;
    // Signature counters advance even when the server refuses the assertion
    utils::save_token(&ctx.token_file, &token)?;
    let user = outcome.context("Login failed")?;
    info!(user = %user.name, "Authentication complete");

    if !ctx.quiet {
        println!();
        println!("{} {}", "✓".green().bold(), "Logged in".green().bold());
        println!("   {} {}", "User:".dimmed(), user.name);
        if !user.display_name.is_empty() {
            println!("   {} {}", "Display name:".dimmed(), user.display_name);
        }
    }

    Ok(())
}
