//! Register command implementation.

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use passgate_core::{CeremonyDriver, Endpoint};
use tracing::info;

use super::ClientContext;
use crate::utils;

/// Execute the register command.
pub async fn execute(ctx: &ClientContext, name: String, display_name: Option<String>) -> Result<()> {
    let token = utils::load_or_create_token(&ctx.token_file, &ctx.token_origin())?;
    let transport = ctx.transport()?;

    let mut options = transport.url("webauthn/register")?;
    options
        .path_segments_mut()
        .map_err(|_| anyhow!("Server URL cannot carry a path: {}", ctx.server))?
        .push(&name);
    if let Some(display_name) = &display_name {
        options
            .query_pairs_mut()
            .append_pair("display_name", display_name);
    }
    let credential = transport.url("webauthn/register")?;

    info!(user = %name, server = %ctx.server, "Starting registration");
    let driver = CeremonyDriver::new(transport, token);
    let outcome = driver
        .register(
            &Endpoint::options(options.as_str()),
            &Endpoint::credential(credential.as_str()),
        )
        .await;

    let (transport, token) = driver.into_parts();
    ctx.save_session(&transport)?;
    let user = outcome.context("Registration failed")?;

    // The new credential exists only once the server accepted it
    utils::save_token(&ctx.token_file, &token)?;
    info!(user = %user.name, "Registration complete");

    if !ctx.quiet {
        println!();
        println!("{} {}", "✓".green().bold(), "Registered".green().bold());
        println!("   {} {}", "User:".dimmed(), user.name);
        if !user.display_name.is_empty() {
            println!("   {} {}", "Display name:".dimmed(), user.display_name);
        }
        println!("   {} {}", "User handle:".dimmed(), user.id);
        println!("   {} {}", "Token:".dimmed(), ctx.token_file.display());
    }

    Ok(())
}
