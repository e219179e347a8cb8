use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use dotenvy::dotenv;

use crate::services::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" => Ok(LogFormat::Plain),
            "json" => Ok(LogFormat::Json),
            other => bail!("LOG_FORMAT must be 'plain' or 'json', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub event_webhook_url: Option<String>,
    pub event_webhook_secret: Option<String>,
    pub store_timeout: Duration,
    pub write_retry: RetryPolicy,
    pub notification_retry: RetryPolicy,
    pub expiry_sweep_interval: Duration,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, so parsing can be tested
    /// without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;

        let event_webhook_url = lookup("EVENT_WEBHOOK_URL").filter(|v| !v.trim().is_empty());
        let event_webhook_secret = lookup("EVENT_WEBHOOK_SECRET").filter(|v| !v.is_empty());
        if event_webhook_url.is_some() && event_webhook_secret.is_none() {
            bail!("EVENT_WEBHOOK_SECRET must be set when EVENT_WEBHOOK_URL is configured");
        }

        Ok(Config {
            database_url,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            event_webhook_url,
            event_webhook_secret,
            store_timeout: Duration::from_millis(parse_or(&lookup, "STORE_TIMEOUT_MS", 5_000)?),
            write_retry: RetryPolicy::new(
                parse_or(&lookup, "WRITE_MAX_ATTEMPTS", 5)?,
                Duration::from_millis(parse_or(&lookup, "WRITE_INITIAL_BACKOFF_MS", 20)?),
            ),
            notification_retry: RetryPolicy::new(
                parse_or(&lookup, "NOTIFICATION_MAX_ATTEMPTS", 3)?,
                Duration::from_millis(parse_or(&lookup, "NOTIFICATION_INITIAL_BACKOFF_MS", 100)?),
            ),
            expiry_sweep_interval: Duration::from_secs(parse_or(
                &lookup,
                "EXPIRY_SWEEP_INTERVAL_SECS",
                300,
            )?),
            log_format: lookup("LOG_FORMAT")
                .map(|v| v.parse::<LogFormat>())
                .transpose()?
                .unwrap_or(LogFormat::Plain),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/r2p")]).unwrap();
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.notification_retry, RetryPolicy::notifications());
        assert_eq!(config.expiry_sweep_interval, Duration::from_secs(300));
        assert_eq!(config.log_format, LogFormat::Plain);
        assert!(config.event_webhook_url.is_none());
    }

    #[test]
    fn database_url_is_required() {
        assert!(config_from(&[]).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/r2p"),
            ("STORE_TIMEOUT_MS", "250"),
            ("WRITE_MAX_ATTEMPTS", "2"),
            ("LOG_FORMAT", "JSON"),
            ("EVENT_WEBHOOK_URL", "https://hooks.example.com/r2p"),
            ("EVENT_WEBHOOK_SECRET", "s3cret"),
        ])
        .unwrap();
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert_eq!(config.write_retry.max_attempts, 2);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.event_webhook_secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn rejects_bad_numbers_and_unsigned_webhooks() {
        assert!(config_from(&[
            ("DATABASE_URL", "postgres://localhost/r2p"),
            ("STORE_TIMEOUT_MS", "soon"),
        ])
        .is_err());

        assert!(config_from(&[
            ("DATABASE_URL", "postgres://localhost/r2p"),
            ("EVENT_WEBHOOK_URL", "https://hooks.example.com/r2p"),
        ])
        .is_err());
    }
}
