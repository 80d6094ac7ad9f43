use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    /// Base URL used to build public resume links. Defaults to the S3 endpoint.
    pub s3_public_url: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    /// Scoring service base URL. Analysis is disabled when unset.
    pub scoring_service_url: Option<String>,
    pub scoring_api_key: Option<String>,
    pub scoring: ScoringSettings,
    pub upload_body_limit_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

/// Polling cadence for the scoring job tracker.
#[derive(Debug, Clone, Copy)]
pub struct ScoringSettings {
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_polls: 120,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let s3_endpoint = require_env("S3_ENDPOINT")?;
        let defaults = ScoringSettings::default();

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_public_url: optional_env("S3_PUBLIC_URL").unwrap_or_else(|| s3_endpoint.clone()),
            s3_endpoint,
            s3_region: optional_env("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            scoring_service_url: optional_env("SCORING_SERVICE_URL"),
            scoring_api_key: optional_env("SCORING_API_KEY"),
            scoring: ScoringSettings {
                poll_interval: Duration::from_secs(parse_env(
                    "SCORING_POLL_INTERVAL_SECS",
                    defaults.poll_interval.as_secs(),
                )?),
                max_polls: parse_env("SCORING_MAX_POLLS", defaults.max_polls)?,
            },
            upload_body_limit_bytes: parse_env::<usize>("UPLOAD_BODY_LIMIT_MB", 512)? * 1024 * 1024,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number")),
        None => Ok(default),
    }
}
