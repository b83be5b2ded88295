//! IMAP connection configuration

use crate::error::{Error, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default cap on a command or untagged response line: 4 MiB.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4 * 1024 * 1024;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Plaintext. Only for local bridges and tests.
    None,
    /// Plaintext greeting, then STARTTLS upgrade.
    StartTls,
    /// TLS from the first byte.
    #[default]
    Implicit,
}

impl Security {
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 143,
            Self::Implicit => 993,
        }
    }
}

impl FromStr for Security {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "plain" => Ok(Self::None),
            "starttls" => Ok(Self::StartTls),
            "tls" | "ssl" | "implicit" => Ok(Self::Implicit),
            other => Err(Error::Config(format!("Unknown IMAP_SECURITY: {other}"))),
        }
    }
}

/// Transport parameters for an IMAP connection
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub security: Security,
    /// Skip certificate verification (self-signed bridges).
    pub accept_invalid_certs: bool,
    /// Longest command line sent or untagged response line accepted.
    /// Literal bodies are not counted.
    pub max_line_length: usize,
    /// Per-command timeout; `None` waits forever.
    pub timeout: Option<Duration>,
}

impl ImapConfig {
    /// Implicit TLS on port 993 with verified certificates.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Security::Implicit.default_port(),
            security: Security::Implicit,
            accept_invalid_certs: false,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            timeout: None,
        }
    }

    /// Load IMAP configuration from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `IMAP_HOST`
    ///
    /// Optional (with defaults):
    /// - `IMAP_SECURITY` (`tls`, `starttls` or `none`; default: `tls`)
    /// - `IMAP_PORT` (default: 993 for TLS, 143 otherwise)
    /// - `IMAP_ACCEPT_INVALID_CERTS` (default: `false`)
    /// - `IMAP_MAX_LINE_LENGTH` in bytes (default: 4 MiB)
    /// - `IMAP_TIMEOUT_SECS` (default: none)
    ///
    /// # Errors
    ///
    /// Returns an error if `IMAP_HOST` is not set or a variable does
    /// not parse.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let host = env::var("IMAP_HOST").map_err(|_| Error::Config("IMAP_HOST not set".into()))?;
        let security = env::var("IMAP_SECURITY")
            .ok()
            .map(|s| s.parse::<Security>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            host,
            port: parse_var("IMAP_PORT")?.unwrap_or_else(|| security.default_port()),
            security,
            accept_invalid_certs: parse_var("IMAP_ACCEPT_INVALID_CERTS")?.unwrap_or(false),
            max_line_length: parse_var("IMAP_MAX_LINE_LENGTH")?.unwrap_or(DEFAULT_MAX_LINE_LENGTH),
            timeout: parse_var("IMAP_TIMEOUT_SECS")?.map(Duration::from_secs),
        })
    }
}

/// Login credentials, kept apart from the connection parameters.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Read `IMAP_USERNAME` and `IMAP_PASSWORD` (`.env` honoured).
    ///
    /// # Errors
    ///
    /// Returns an error if either variable is not set.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            username: env::var("IMAP_USERNAME")
                .map_err(|_| Error::Config("IMAP_USERNAME not set".into()))?,
            password: env::var("IMAP_PASSWORD")
                .map_err(|_| Error::Config("IMAP_PASSWORD not set".into()))?,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid {name}: {e}"))),
        Err(_) => Ok(None),
    }
}
