//! Token and session file handling shared across CLI commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use passgate_core::SoftToken;
use tracing::debug;

/// Session cookies live next to the token: `token.json` → `token.json.session`.
pub fn session_path(token_file: &Path) -> PathBuf {
    let mut path = token_file.as_os_str().to_owned();
    path.push(".session");
    PathBuf::from(path)
}

/// Load the software authenticator from its JSON file.
pub fn load_token(path: &Path) -> Result<SoftToken> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read token file: {}", path.display()))?;
    let token = SoftToken::from_json(&json)
        .with_context(|| format!("Invalid token file: {}", path.display()))?;
    debug!(path = %path.display(), "Loaded token");
    Ok(token)
}

/// Load the token if it exists, otherwise create one reporting `origin`.
pub fn load_or_create_token(path: &Path, origin: &str) -> Result<SoftToken> {
    if path.exists() {
        return load_token(path);
    }
    debug!(path = %path.display(), origin, "Creating new token");
    Ok(SoftToken::new(origin))
}

pub fn save_token(path: &Path, token: &SoftToken) -> Result<()> {
    let json = token.to_json().context("Failed to serialize token")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write token file: {}", path.display()))?;
    debug!(path = %path.display(), "Saved token");
    Ok(())
}

pub fn load_session(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let cookie = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read session file: {}", path.display()))?;
    let cookie = cookie.trim();
    Ok((!cookie.is_empty()).then(|| cookie.to_string()))
}

pub fn save_session(path: &Path, cookie: Option<&str>) -> Result<()> {
    match cookie {
        Some(cookie) => std::fs::write(path, cookie)
            .with_context(|| format!("Failed to write session file: {}", path.display())),
        None => clear_session(path),
    }
}

pub fn clear_session(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to remove session file: {}", path.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_path() {
        assert_eq!(
            session_path(Path::new("passgate-token.json")),
            PathBuf::from("passgate-token.json.session")
        );
        assert_eq!(
            session_path(Path::new("/tmp/keys/token")),
            PathBuf::from("/tmp/keys/token.session")
        );
    }

    #[test]
    fn test_token_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");

        let token = load_or_create_token(&path, "http://localhost:3000").unwrap();
        save_token(&path, &token).unwrap();

        let loaded = load_token(&path).unwrap();
        assert_eq!(loaded.origin().unwrap(), "http://localhost:3000");
        assert!(loaded.credentials().unwrap().is_empty());
    }

    #[test]
    fn test_missing_token_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_token(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.chain().any(|c| c.is::<std::io::Error>()));
    }

    #[test]
    fn test_session_file_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json.session");

        assert_eq!(load_session(&path).unwrap(), None);
        save_session(&path, Some("passgate.sid=abc")).unwrap();
        assert_eq!(load_session(&path).unwrap().as_deref(), Some("passgate.sid=abc"));

        clear_session(&path).unwrap();
        assert!(!path.exists());
        // Clearing twice is fine
        clear_session(&path).unwrap();
    }
}
