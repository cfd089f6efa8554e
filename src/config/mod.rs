//! Configuration module for the clinic roster.
//!
//! All configuration is loaded from environment variables (and an optional
//! `.env` file) with sensible defaults. The backend dialect is fixed here and
//! never inferred from responses.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::roster::IdentifierPolicy;

/// Which spreadsheet front end the remote store speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Google Apps Script web app (`?action=` webhook)
    AppsScript,
    /// Sheety REST proxy
    Sheety,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::AppsScript => "apps-script",
            BackendKind::Sheety => "sheety",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "apps-script" | "appsscript" | "webhook" => Some(BackendKind::AppsScript),
            "sheety" => Some(BackendKind::Sheety),
            _ => None,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend dialect
    pub backend: BackendKind,
    /// Apps Script exec URL or Sheety collection URL
    pub endpoint: String,
    /// Sheet (tab) name; Sheety wraps the row list under this key
    pub sheet_name: String,
    /// Key Sheety wraps a single row under on writes
    pub record_key: String,
    /// What to do when create does not echo an id
    pub id_policy: IdentifierPolicy,
    /// Per-request timeout for the sync client
    pub http_timeout: Duration,
    /// Path to the stub sheet server's SQLite file
    pub db_path: PathBuf,
    /// Address the stub sheet server binds to
    pub bind_addr: SocketAddr,
    /// Whether the stub Apps Script dialect returns the new row id on create
    pub echo_ids: bool,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("CLINIC_BACKEND") {
            Some(value) => BackendKind::parse(&value).ok_or(ConfigError {
                key: "CLINIC_BACKEND",
                value,
                expected: "apps-script or sheety",
            })?,
            None => BackendKind::AppsScript,
        };

        let endpoint = lookup("CLINIC_SHEET_ENDPOINT")
            .unwrap_or_else(|| "http://127.0.0.1:8080/macros/exec".to_string());

        let sheet_name = lookup("CLINIC_SHEET_NAME").unwrap_or_else(|| "employees".to_string());

        let record_key = lookup("CLINIC_RECORD_KEY").unwrap_or_else(|| singular(&sheet_name));

        let id_policy = match lookup("CLINIC_ID_POLICY") {
            Some(value) => IdentifierPolicy::parse(&value).ok_or(ConfigError {
                key: "CLINIC_ID_POLICY",
                value,
                expected: "require-echo or next-local",
            })?,
            None => IdentifierPolicy::default(),
        };

        let http_timeout = match lookup("CLINIC_HTTP_TIMEOUT_SECS") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError {
                        key: "CLINIC_HTTP_TIMEOUT_SECS",
                        value,
                        expected: "a positive number of seconds",
                    })
                }
            },
            None => Duration::from_secs(15),
        };

        let db_path = lookup("CLINIC_DB_PATH")
            .unwrap_or_else(|| "./data/sheet.sqlite".to_string())
            .into();

        let bind_value =
            lookup("CLINIC_BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let bind_addr = bind_value.parse().map_err(|_| ConfigError {
            key: "CLINIC_BIND_ADDR",
            value: bind_value.clone(),
            expected: "host:port",
        })?;

        let echo_ids = match lookup("CLINIC_ECHO_IDS") {
            Some(value) => parse_bool(&value).ok_or(ConfigError {
                key: "CLINIC_ECHO_IDS",
                value,
                expected: "true or false",
            })?,
            None => true,
        };

        let log_level = lookup("CLINIC_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            backend,
            endpoint,
            sheet_name,
            record_key,
            id_policy,
            http_timeout,
            db_path,
            bind_addr,
            echo_ids,
            log_level,
        })
    }
}

/// Sheety names a single row after the sheet minus its plural `s`.
fn singular(sheet_name: &str) -> String {
    sheet_name
        .strip_suffix('s')
        .filter(|s| !s.is_empty())
        .unwrap_or(sheet_name)
        .to_string()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
