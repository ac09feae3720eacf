use crate::items::{SheetNames, DEFAULT_DATA_SHEET, DEFAULT_LOG_SHEET};
use bijux_sheets_store::{RetryPolicy, DEFAULT_SHEETS_API_BASE, DEFAULT_TOKEN_URI};
use serde::Serialize;
use std::fmt::{Debug, Display, Formatter};
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: &str = "1";

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Google,
    Memory,
}

impl BackendMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "google" | "sheets" => Some(Self::Google),
            "memory" | "mem" => Some(Self::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    pub max_body_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Credential material that must never reach a log line.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: Option<String>,
    pub sheets: SheetNames,
    pub api_base_url: String,
    pub client_email: Option<String>,
    pub private_key: Option<Secret>,
    pub token_uri: String,
    pub bearer: Option<Secret>,
    pub retry: RetryPolicy,
    pub http_timeout: Duration,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            sheets: SheetNames::default(),
            api_base_url: DEFAULT_SHEETS_API_BASE.to_string(),
            client_email: None,
            private_key: None,
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            bearer: None,
            retry: RetryPolicy::default(),
            http_timeout: Duration::from_millis(15_000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub backend: BackendMode,
    pub sheets: SheetsConfig,
    pub api: ApiConfig,
    pub log_json: bool,
    pub shutdown_drain: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            backend: BackendMode::Google,
            sheets: SheetsConfig::default(),
            api: ApiConfig::default(),
            log_json: true,
            shutdown_drain: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(name) => write!(f, "missing required setting {name}"),
            Self::Invalid {
                name,
                value,
                reason,
            } => write!(f, "invalid {name}={value}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn invalid(name: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string_or(&self, name: &str, default: &str) -> String {
        self.string(name).unwrap_or_else(|| default.to_string())
    }

    fn bool(&self, name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.string(name) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "1" | "true" | "TRUE" | "yes" | "YES" => Ok(true),
                "0" | "false" | "FALSE" | "no" | "NO" => Ok(false),
                _ => Err(invalid(name, &v, "expected a boolean")),
            },
        }
    }

    fn u64(&self, name: &'static str, default: u64) -> Result<u64, ConfigError> {
        match self.string(name) {
            None => Ok(default),
            Some(v) => v
                .parse::<u64>()
                .map_err(|_| invalid(name, &v, "expected an unsigned integer")),
        }
    }

    fn usize(&self, name: &'static str, default: usize) -> Result<usize, ConfigError> {
        match self.string(name) {
            None => Ok(default),
            Some(v) => v
                .parse::<usize>()
                .map_err(|_| invalid(name, &v, "expected an unsigned integer")),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads every `SHEETS_*` setting through `lookup` and validates the result.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        let defaults = Self::default();

        let backend = match env.string("SHEETS_BACKEND") {
            None => defaults.backend,
            Some(raw) => BackendMode::parse(&raw)
                .ok_or_else(|| invalid("SHEETS_BACKEND", &raw, "expected google or memory"))?,
        };

        let sheets = SheetsConfig {
            spreadsheet_id: env.string("SHEETS_SPREADSHEET_ID"),
            sheets: SheetNames {
                data: env.string_or("SHEETS_DATA_SHEET", DEFAULT_DATA_SHEET),
                log: env.string_or("SHEETS_LOG_SHEET", DEFAULT_LOG_SHEET),
            },
            api_base_url: env.string_or("SHEETS_API_BASE_URL", DEFAULT_SHEETS_API_BASE),
            client_email: env.string("SHEETS_CLIENT_EMAIL"),
            private_key: env.string("SHEETS_PRIVATE_KEY").map(Secret::new),
            token_uri: env.string_or("SHEETS_TOKEN_URI", DEFAULT_TOKEN_URI),
            bearer: env.string("SHEETS_BEARER").map(Secret::new),
            retry: RetryPolicy {
                max_attempts: env.usize(
                    "SHEETS_RETRY_ATTEMPTS",
                    defaults.sheets.retry.max_attempts,
                )?,
                base_backoff_ms: env.u64(
                    "SHEETS_RETRY_BASE_MS",
                    defaults.sheets.retry.base_backoff_ms,
                )?,
            },
            http_timeout: Duration::from_millis(env.u64("SHEETS_HTTP_TIMEOUT_MS", 15_000)?),
        };

        let config = Self {
            bind_addr: env.string_or("SHEETS_BIND", DEFAULT_BIND),
            backend,
            sheets,
            api: ApiConfig {
                max_body_bytes: env.usize("SHEETS_MAX_BODY_BYTES", defaults.api.max_body_bytes)?,
            },
            log_json: env.bool("SHEETS_LOG_JSON", defaults.log_json)?,
            shutdown_drain: Duration::from_millis(env.u64("SHEETS_SHUTDOWN_DRAIN_MS", 2000)?),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.max_body_bytes == 0 {
            return Err(invalid("SHEETS_MAX_BODY_BYTES", "0", "must be > 0"));
        }
        if self.sheets.retry.max_attempts == 0 {
            return Err(invalid("SHEETS_RETRY_ATTEMPTS", "0", "must be > 0"));
        }
        if self.sheets.http_timeout.is_zero() {
            return Err(invalid("SHEETS_HTTP_TIMEOUT_MS", "0", "must be > 0"));
        }
        if self.sheets.sheets.data == self.sheets.sheets.log {
            return Err(invalid(
                "SHEETS_LOG_SHEET",
                &self.sheets.sheets.log,
                "log sheet must differ from the data sheet",
            ));
        }
        if self.backend == BackendMode::Google {
            if self.sheets.spreadsheet_id.is_none() {
                return Err(ConfigError::Missing("SHEETS_SPREADSHEET_ID"));
            }
            match (&self.sheets.client_email, &self.sheets.private_key) {
                (Some(_), None) => return Err(ConfigError::Missing("SHEETS_PRIVATE_KEY")),
                (None, Some(_)) => return Err(ConfigError::Missing("SHEETS_CLIENT_EMAIL")),
                _ => {}
            }
        }
        Ok(())
    }
}
