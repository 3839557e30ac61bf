//! Relying-party server settings.
//!
//! [`Config::default`] suits tests; [`Config::from_env`] is what `main` uses.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use passgate_core::{
    AttestationPreference, CeremonyConfig, ConfigError, CoseAlgorithm,
    UserVerificationRequirement,
};

/// Listener, middleware and relying-party settings
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen port, 3000 unless `PORT` is set
    pub port: u16,
    /// Bind address; loopback unless `HOST=0.0.0.0`
    pub host: [u8; 4],
    /// CORS allow-list; `None` opens CORS to any origin
    pub allowed_origins: Option<Vec<String>>,
    /// Largest accepted request body, in KiB
    pub body_limit_kb: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Per-IP throttling; off in [`Config::default`], on from the environment
    pub rate_limit_enabled: bool,
    /// Sustained requests per second per IP
    pub rate_limit_per_sec: u64,
    /// Requests allowed in a burst
    pub rate_limit_burst: u32,
    /// Session cookie inactivity expiry in minutes (default: 30)
    pub session_ttl_minutes: i64,
    /// Mark the session cookie `Secure` (default: false for tests, true from env)
    pub secure_cookies: bool,
    /// PostgreSQL URL; in-memory credential store when unset
    pub database_url: Option<String>,
    /// Pool size when a database is configured
    pub database_max_connections: u32,
    /// Relying party id (default: localhost)
    pub rp_id: String,
    /// Relying party display name (default: the id)
    pub rp_name: Option<String>,
    /// Expected client origin (default: http://localhost:3000)
    pub rp_origin: Option<String>,
    /// Attestation conveyance preference, as configured
    pub rp_attestation: Option<String>,
    /// Acceptable algorithms, comma-separated names or COSE ids
    pub rp_algorithms: Option<String>,
    /// Require discoverable credentials (default: true)
    pub rp_require_resident_key: bool,
    /// User verification requirement, as configured
    pub rp_user_verification: Option<String>,
    /// Lifetime of an issued challenge in seconds (default: 300)
    pub challenge_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            allowed_origins: None,
            body_limit_kb: 64,
            timeout_secs: 30,
            rate_limit_enabled: false,
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            session_ttl_minutes: 30,
            secure_cookies: false,
            database_url: None,
            database_max_connections: 10,
            rp_id: "localhost".to_string(),
            rp_name: Some("Passgate".to_string()),
            rp_origin: Some("http://localhost:3000".to_string()),
            rp_attestation: None,
            rp_algorithms: None,
            rp_require_resident_key: true,
            rp_user_verification: None,
            challenge_ttl_secs: 300,
        }
    }
}

impl Config {
    /// Read settings from the process environment.
    ///
    /// Unset or unparsable variables fall back to [`Config::default`], except
    /// that rate limiting and secure cookies are on unless disabled.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // Only an explicit wildcard binds beyond loopback
        let host = match env("HOST").as_deref() {
            Some("0.0.0.0") => [0, 0, 0, 0],
            Some(_) => [127, 0, 0, 1],
            None => defaults.host,
        };

        let allowed_origins = env("ALLOWED_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Self {
            port: env_parse("PORT", defaults.port),
            host,
            allowed_origins,
            body_limit_kb: env_parse("BODY_LIMIT_KB", defaults.body_limit_kb),
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", defaults.timeout_secs),
            rate_limit_enabled: env_flag("RATE_LIMIT_ENABLED", true),
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC", defaults.rate_limit_per_sec),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST", defaults.rate_limit_burst),
            session_ttl_minutes: env_parse("SESSION_TTL_MINUTES", defaults.session_ttl_minutes),
            secure_cookies: env_flag("SECURE_COOKIES", true),
            database_url: env("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            database_max_connections: env_parse(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            rp_id: env("RP_ID").unwrap_or(defaults.rp_id),
            rp_name: env("RP_NAME").or(defaults.rp_name),
            rp_origin: env("RP_ORIGIN").or(defaults.rp_origin),
            rp_attestation: env("RP_ATTESTATION"),
            rp_algorithms: env("RP_ALGORITHMS"),
            rp_require_resident_key: env_flag(
                "RP_REQUIRE_RESIDENT_KEY",
                defaults.rp_require_resident_key,
            ),
            rp_user_verification: env("RP_USER_VERIFICATION"),
            challenge_ttl_secs: env_parse("CHALLENGE_TTL_SECS", defaults.challenge_ttl_secs),
        }
    }

    /// Address the listener binds to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    /// Resolve the relying-party settings into a validated ceremony config.
    pub fn ceremony_config(&self) -> Result<CeremonyConfig, ConfigError> {
        let mut builder = CeremonyConfig::builder(self.rp_id.clone())
            .require_resident_key(self.rp_require_resident_key)
            .challenge_ttl(Duration::from_secs(self.challenge_ttl_secs));

        if let Some(name) = &self.rp_name {
            builder = builder.relying_party_name(name.clone());
        }
        if let Some(origin) = &self.rp_origin {
            builder = builder.origin(origin.clone());
        }
        if let Some(attestation) = &self.rp_attestation {
            builder = builder.attestation(attestation.parse::<AttestationPreference>()?);
        }
        if let Some(requirement) = &self.rp_user_verification {
            builder = builder.user_verification(requirement.parse::<UserVerificationRequirement>()?);
        }
        if let Some(algorithms) = &self.rp_algorithms {
            builder = builder.algorithms(parse_algorithms(algorithms)?);
        }

        builder.build()
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Anything but `false` (case-insensitive) enables a flag.
fn env_flag(key: &str, default: bool) -> bool {
    env(key).map_or(default, |v| !v.trim().eq_ignore_ascii_case("false"))
}

/// Parse a comma-separated algorithm list ("ES256, -8, RS256").
fn parse_algorithms(list: &str) -> Result<Vec<CoseAlgorithm>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert!(!config.rate_limit_enabled);
        assert!(config.database_url.is_none());
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn test_default_ceremony_config() {
        let ceremony = Config::default().ceremony_config().unwrap();
        assert_eq!(ceremony.relying_party_id(), "localhost");
        assert_eq!(ceremony.relying_party_name(), "Passgate");
        assert_eq!(ceremony.origin(), "http://localhost:3000");
        assert_eq!(ceremony.challenge_ttl(), Duration::from_secs(300));
        assert_eq!(ceremony.algorithms(), &[CoseAlgorithm::ES256, CoseAlgorithm::RS256]);
    }

    #[test]
    fn test_parse_algorithms_accepts_names_and_ids() {
        let algorithms = parse_algorithms("ES256, -8 ,rs256,").unwrap();
        assert_eq!(
            algorithms,
            vec![CoseAlgorithm::ES256, CoseAlgorithm::EdDSA, CoseAlgorithm::RS256]
        );
    }

    #[test]
    fn test_invalid_relying_party_settings_are_rejected() {
        let config = Config {
            rp_algorithms: Some("ES256,HS256".into()),
            ..Config::default()
        };
        assert!(matches!(
            config.ceremony_config(),
            Err(ConfigError::UnknownAlgorithm(_))
        ));

        let config = Config {
            rp_attestation: Some("sometimes".into()),
            ..Config::default()
        };
        assert!(config.ceremony_config().is_err());

        let config = Config {
            rp_id: "   ".into(),
            ..Config::default()
        };
        assert_eq!(
            config.ceremony_config().unwrap_err(),
            ConfigError::MissingRelyingPartyId
        );
    }
}
