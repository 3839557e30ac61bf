//! Whoami command implementation.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use passgate_core::{CeremonyResult, CeremonyTransport, Endpoint};
use serde_json::Value;

use super::ClientContext;

/// Execute the whoami command.
pub async fn execute(ctx: &ClientContext, json: bool) -> Result<()> {
    let transport = ctx.transport()?;
    let endpoint = Endpoint::options(transport.url("webauthn/session")?.as_str());
    let session = transport
        .send(&endpoint, None)
        .await
        .context("Failed to query session")?;

    let authenticated = session
        .get("authenticated")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let phase = session.get("phase").and_then(Value::as_str).unwrap_or("idle");

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
    }
    if !authenticated {
        bail!("Not logged in (session phase: {phase})");
    }

    let user: CeremonyResult = session
        .get("user")
        .cloned()
        .map(serde_json::from_value::<CeremonyResult>)
        .transpose()
        .context("Unexpected session response")?
        .context("Session is authenticated but carries no user")?;

    if !json && !ctx.quiet {
        println!("{} {}", "User:".dimmed(), user.name.bold());
        if !user.display_name.is_empty() {
            println!("{} {}", "Display name:".dimmed(), user.display_name);
        }
        println!("{} {}", "User handle:".dimmed(), user.id);
        if let Some(kind) = session.get("ceremony").and_then(Value::as_str) {
            println!("{} {}", "Pending:".dimmed(), kind.yellow());
        }
    }

    Ok(())
}
