//! CLI command implementations.

use std::path::PathBuf;

use anyhow::Result;
use reqwest::Url;

use crate::transport::HttpTransport;
use crate::utils;

pub mod login;
pub mod logout;
pub mod register;
pub mod token;
pub mod whoami;

/// Settings shared by every command.
pub struct ClientContext {
    pub server: Url,
    pub token_file: PathBuf,
    /// Origin written into new tokens (defaults to the server's origin)
    pub origin: Option<String>,
    pub quiet: bool,
}

impl ClientContext {
    pub fn session_file(&self) -> PathBuf {
        utils::session_path(&self.token_file)
    }

    /// Origin a newly created token reports in its client data.
    pub fn token_origin(&self) -> String {
        self.origin
            .clone()
            .unwrap_or_else(|| self.server.origin().ascii_serialization())
    }

    /// Transport carrying the session saved by a previous invocation.
    pub fn transport(&self) -> Result<HttpTransport> {
        let session = utils::load_session(&self.session_file())?;
        HttpTransport::new(&self.server, session.as_deref())
    }

    pub fn save_session(&self, transport: &HttpTransport) -> Result<()> {
        utils::save_session(&self.session_file(), transport.session_cookie().as_deref())
    }
}
