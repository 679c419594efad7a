use std::env;
use std::str::FromStr;

use chrono::Duration;
use log::info;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Mongo,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub database_name: String,
    pub access_token_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_secret: String,
    pub refresh_token_ttl: Duration,
    pub otp_ttl: Duration,
    pub admin_emails: Vec<String>,
    pub cors_origin: String,
    pub secure_cookies: bool,
    pub mail_from: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests need not touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str, default: &str| -> String {
            lookup(key).unwrap_or_else(|| {
                info!("{key} not set, using default: {default}");
                default.to_string()
            })
        };
        let require = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let storage = parse("STORAGE", get("STORAGE", "mongo"))?;
        let database_url = match storage {
            StorageBackend::Mongo => Some(require("DATABASE_URL")?),
            StorageBackend::Memory => lookup("DATABASE_URL"),
        };

        Ok(Config {
            host: get("HOST", "127.0.0.1"),
            port: parse("PORT", get("PORT", "8000"))?,
            storage,
            database_url,
            database_name: get("DATABASE_NAME", "plant_store"),
            access_token_secret: require("ACCESS_TOKEN_SECRET")?,
            access_token_ttl: ttl("ACCESS_TOKEN_EXPIRY", get("ACCESS_TOKEN_EXPIRY", "1d"))?,
            refresh_token_secret: require("REFRESH_TOKEN_SECRET")?,
            refresh_token_ttl: ttl("REFRESH_TOKEN_EXPIRY", get("REFRESH_TOKEN_EXPIRY", "10d"))?,
            otp_ttl: ttl("OTP_EXPIRY", get("OTP_EXPIRY", "5m"))?,
            admin_emails: parse_list(&lookup("ADMIN_EMAILS").unwrap_or_default()),
            cors_origin: get("CORS_ORIGIN", "http://localhost:5173"),
            secure_cookies: parse("COOKIE_SECURE", get("COOKIE_SECURE", "true"))?,
            mail_from: get("MAIL_FROM", "Plant Store <no-reply@plantstore.local>"),
        })
    }
}

fn parse<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

fn ttl(key: &'static str, value: String) -> Result<Duration, ConfigError> {
    parse_ttl(&value).ok_or(ConfigError::Invalid { key, value })
}

/// Parses `30s`, `15m`, `2h`, `7d` or a bare number of seconds.
pub fn parse_ttl(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (digits, unit) = match value.char_indices().last()? {
        (i, c) if c.is_ascii_alphabetic() => (&value[..i], Some(c.to_ascii_lowercase())),
        _ => (value, None),
    };
    let amount: i64 = digits.parse().ok()?;
    if amount <= 0 {
        return None;
    }
    match unit {
        None | Some('s') => Some(Duration::seconds(amount)),
        Some('m') => Some(Duration::minutes(amount)),
        Some('h') => Some(Duration::hours(amount)),
        Some('d') => Some(Duration::days(amount)),
        Some(_) => None,
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
