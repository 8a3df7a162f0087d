//! Environment configuration
//!
//! Everything is read once at startup. Unset or blank variables take their
//! defaults; malformed values are startup errors rather than silent fallbacks,
//! except for booleans and the log level.

use pinning_core::{DomainMatcher, PinningError, Signer};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{warn, Level};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SIGNATURE_LIFETIME: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
/// Headroom the request deadline keeps over the dial timeout
pub const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid signing key: {0}")]
    Key(#[from] PinningError),
}

/// Validated server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Listening port
    pub port: u16,
    /// Whitelist patterns, trimmed, empties dropped
    pub allowed_domains: Vec<String>,
    /// Accept IP literal hosts
    pub allow_ip_literals: bool,
    /// Envelope lifetime
    pub signature_lifetime: Duration,
    /// PEM signing key
    pub private_key_pem: String,
    /// Bound on TCP connect plus TLS handshake
    pub cert_dial_timeout: Duration,
    /// Certificate cache TTL; zero disables the cache
    pub cert_cache_ttl: Duration,
    /// Whole-request timeout, always longer than the dial timeout
    pub request_timeout: Duration,
    /// Maximum log level
    pub log_level: String,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("allowed_domains", &self.allowed_domains)
            .field("allow_ip_literals", &self.allow_ip_literals)
            .field("signature_lifetime", &self.signature_lifetime)
            .field("private_key_pem", &"[redacted]")
            .field("cert_dial_timeout", &self.cert_dial_timeout)
            .field("cert_cache_ttl", &self.cert_cache_ttl)
            .field("request_timeout", &self.request_timeout)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl ServerConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                message: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let allowed_domains = parse_domain_list(&get("ALLOWED_DOMAINS").unwrap_or_default());
        if allowed_domains.is_empty() {
            return Err(ConfigError::Missing("ALLOWED_DOMAINS"));
        }

        let allow_ip_literals = parse_bool("ALLOW_IP_LITERALS", get("ALLOW_IP_LITERALS"), false);

        let signature_lifetime =
            parse_duration("SIGNATURE_LIFETIME", get("SIGNATURE_LIFETIME"), DEFAULT_SIGNATURE_LIFETIME)?;
        if signature_lifetime < Duration::from_secs(1) {
            return Err(ConfigError::Invalid {
                key: "SIGNATURE_LIFETIME",
                message: "must be at least one second".into(),
            });
        }

        let private_key_pem = match (get("PRIVATE_KEY_PEM"), get("PRIVATE_KEY_PATH")) {
            (Some(pem), _) => pem,
            (None, Some(path)) => {
                let path = PathBuf::from(path.trim());
                std::fs::read_to_string(&path).map_err(|source| ConfigError::Io { path, source })?
            }
            (None, None) => return Err(ConfigError::Missing("PRIVATE_KEY_PEM")),
        };

        let cert_dial_timeout =
            parse_duration("CERT_DIAL_TIMEOUT", get("CERT_DIAL_TIMEOUT"), DEFAULT_DIAL_TIMEOUT)?;
        if cert_dial_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: "CERT_DIAL_TIMEOUT",
                message: "must be positive".into(),
            });
        }

        let cert_cache_ttl = parse_duration("CERT_CACHE_TTL", get("CERT_CACHE_TTL"), DEFAULT_CACHE_TTL)?;

        let request_timeout = parse_duration(
            "REQUEST_TIMEOUT",
            get("REQUEST_TIMEOUT"),
            default_request_timeout(cert_dial_timeout),
        )?;
        if request_timeout <= cert_dial_timeout {
            return Err(ConfigError::Invalid {
                key: "REQUEST_TIMEOUT",
                message: format!(
                    "must exceed CERT_DIAL_TIMEOUT ({})",
                    humantime::format_duration(cert_dial_timeout)
                ),
            });
        }

        let log_level = get("LOG_LEVEL")
            .map(|level| level.trim().to_lowercase())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.into());

        Ok(Self {
            port,
            allowed_domains,
            allow_ip_literals,
            signature_lifetime,
            private_key_pem,
            cert_dial_timeout,
            cert_cache_ttl,
            request_timeout,
            log_level,
        })
    }

    /// Subscriber level; unrecognized names fall back to info
    pub fn max_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }

    /// Build the whitelist matcher
    pub fn matcher(&self) -> DomainMatcher {
        DomainMatcher::new(&self.allowed_domains).with_ip_literals(self.allow_ip_literals)
    }

    /// Parse the signing key
    pub fn load_signer(&self) -> Result<Signer, ConfigError> {
        Ok(Signer::from_pem(&self.private_key_pem)?)
    }
}

/// Request deadline used when `REQUEST_TIMEOUT` is unset
pub fn default_request_timeout(cert_dial_timeout: Duration) -> Duration {
    cert_dial_timeout + REQUEST_TIMEOUT_MARGIN
}

/// Split a comma-separated whitelist, trimming and dropping empty entries
pub fn parse_domain_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(String::from)
        .collect()
}

fn parse_duration(
    key: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match raw {
        Some(raw) => humantime::parse_duration(raw.trim()).map_err(|e| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, raw: Option<String>, default: bool) -> bool {
    let Some(raw) = raw else {
        return default;
    };

    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        other => {
            warn!(key = key, value = %other, default = default, "Unrecognized boolean, using default");
            default
        }
    }
}
