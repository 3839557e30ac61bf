//! Process exit codes, borrowed from `sysexits.h`.
//!
//! Scripts can tell a bad invocation from an unreachable server or a
//! rejected credential without parsing stderr.

use passgate_core::CeremonyError;

/// Success.
pub const SUCCESS: i32 = 0;

/// Anything not covered below.
pub const GENERAL_ERROR: i32 = 1;

/// Bad flags or arguments.
/// `EX_USAGE`
pub const USAGE_ERROR: i32 = 64;

/// The relying party or the authenticator rejected the ceremony.
/// `EX_DATAERR`
pub const CEREMONY_REJECTED: i32 = 65;

/// Server unreachable or failing (connection refused, 5xx).
/// `EX_UNAVAILABLE`
pub const SERVER_UNAVAILABLE: i32 = 69;

/// I/O error (token or session file).
/// `EX_IOERR`
pub const IO_ERROR: i32 = 74;

/// Exit status plus the message printed before exiting.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Classify by the first recognizable cause in the chain
        let code = err
            .chain()
            .find_map(|cause| {
                if cause.downcast_ref::<std::io::Error>().is_some() {
                    Some(IO_ERROR)
                } else {
                    cause.downcast_ref::<CeremonyError>().map(classify_ceremony)
                }
            })
            .unwrap_or(GENERAL_ERROR);

        Self {
            code,
            message: Some(message),
        }
    }
}

fn classify_ceremony(err: &CeremonyError) -> i32 {
    match err {
        CeremonyError::Transport(message) => {
            // 4xx: the server understood and refused
            if message.starts_with("unexpected HTTP 4") {
                CEREMONY_REJECTED
            } else {
                SERVER_UNAVAILABLE
            }
        }
        CeremonyError::Config(_) => USAGE_ERROR,
        CeremonyError::Store(_) => IO_ERROR,
        CeremonyError::Entropy(_) => GENERAL_ERROR,
        _ => CEREMONY_REJECTED,
    }
}
