//! Passgate CLI - WebAuthn client with a software authenticator.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use reqwest::Url;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod transport;
mod utils;

use commands::ClientContext;
use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error (e.g. not logged in)
  64  Usage error (invalid arguments)
  65  Ceremony rejected by the server or the authenticator
  69  Server unavailable
  74  I/O error (token or session file)";

#[derive(Parser)]
#[command(name = "passgate")]
#[command(author, version, about = "Passwordless WebAuthn login from the command line", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Relying party base URL
    #[arg(long, global = true, env = "PASSGATE_URL", default_value = "http://localhost:3000", value_parser = parse_url)]
    url: Url,

    /// Software authenticator file (created on first registration)
    #[arg(long, global = true, env = "PASSGATE_TOKEN_FILE", default_value = "passgate-token.json")]
    token_file: PathBuf,

    /// Origin reported by a new token (defaults to the server URL's origin)
    #[arg(long, global = true, env = "PASSGATE_ORIGIN")]
    origin: Option<String>,

    /// Show debug logs
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Print nothing on success
    #[arg(short, long, global = true)]
    quiet: bool,

    /// When to use colors
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new passkey for a user
    Register {
        /// User name (1 to 64 bytes)
        #[arg(value_name = "NAME")]
        name: String,

        /// Human-friendly name shown by authenticators
        #[arg(long)]
        display_name: Option<String>,
    },

    /// Log in with a stored passkey
    Login {
        /// Prefer this user's passkey when the token holds several
        #[arg(long)]
        user: Option<String>,
    },

    /// Show the user logged in to the saved session
    Whoami {
        /// Print the raw session document
        #[arg(long)]
        json: bool,
    },

    /// End the saved session
    Logout,

    /// Inspect the software authenticator
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// List stored passkeys
    Show {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_url(value: &str) -> std::result::Result<Url, String> {
    let url = Url::parse(value).map_err(|e| format!("invalid URL: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme: {other}")),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "passgate=debug,passgate_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = ClientContext {
        server: cli.url,
        token_file: cli.token_file,
        origin: cli.origin,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Register { name, display_name } => {
            commands::register::execute(&ctx, name, display_name).await
        }
        Commands::Login { user } => commands::login::execute(&ctx, user).await,
        Commands::Whoami { json } => commands::whoami::execute(&ctx, json).await,
        Commands::Logout => commands::logout::execute(&ctx).await,
        Commands::Token { command } => match command {
            TokenCommands::Show { json } => commands::token::show(&ctx, json),
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    match cli.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {}
    }
    init_logging(cli.verbose);

    let exit = match run(cli).await {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
