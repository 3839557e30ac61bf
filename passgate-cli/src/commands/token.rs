//! Token command implementation.
//!
//! Inspects the software authenticator file without contacting a server.

use anyhow::Result;
use colored::Colorize;

use super::ClientContext;
use crate::utils;

/// Execute `token show`.
pub fn show(ctx: &ClientContext, json: bool) -> Result<()> {
    let token = utils::load_token(&ctx.token_file)?;
    let credentials = token.credentials()?;

    if json {
        let value = serde_json::json!({
            "origin": token.origin()?,
            "credentials": credentials,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{} {}", "Token:".dimmed(), ctx.token_file.display());
    println!("{} {}", "Origin:".dimmed(), token.origin()?);
    if credentials.is_empty() {
        println!("{}", "No credentials".yellow());
        return Ok(());
    }

    println!();
    for credential in &credentials {
        println!(
            "  {} {} {}",
            "•".cyan(),
            credential.user_name.bold(),
            format!("@ {}", credential.rp_id).dimmed()
        );
        println!("      {} {}", "Credential:".dimmed(), credential.credential_id);
        println!("      {} {}", "Counter:".dimmed(), credential.counter);
    }

    Ok(())
}
