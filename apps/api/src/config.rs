use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::state::DEFAULT_RUN_RETENTION;

/// Which key-value backend persists resume records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvBackend {
    Redis,
    Memory,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub kv_backend: KvBackend,
    pub redis_url: Option<String>,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub api_token: String,
    pub api_user: String,
    pub port: u16,
    pub rust_log: String,
    /// Upper bound on the AI step. `None` waits indefinitely.
    pub ai_timeout: Option<Duration>,
    pub preview_dpi: u32,
    /// How long finished runs stay pollable through the status endpoint.
    pub run_retention: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let kv_backend = match std::env::var("KV_BACKEND").as_deref() {
            Ok("memory") => KvBackend::Memory,
            Ok("redis") | Err(_) => KvBackend::Redis,
            Ok(other) => bail!("KV_BACKEND must be 'redis' or 'memory', got '{other}'"),
        };
        let redis_url = match kv_backend {
            KvBackend::Redis => Some(require_env("REDIS_URL")?),
            KvBackend::Memory => std::env::var("REDIS_URL").ok(),
        };

        let ai_timeout_secs = optional_parsed::<u64>("AI_TIMEOUT_SECS", 180)?;

        Ok(Config {
            kv_backend,
            redis_url,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            api_token: require_env("API_TOKEN")?,
            api_user: std::env::var("API_USER").unwrap_or_else(|_| "owner".to_string()),
            port: optional_parsed("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            ai_timeout: (ai_timeout_secs > 0).then(|| Duration::from_secs(ai_timeout_secs)),
            preview_dpi: optional_parsed("PREVIEW_DPI", 150)?,
            run_retention: Duration::from_secs(optional_parsed(
                "RUN_RETENTION_SECS",
                DEFAULT_RUN_RETENTION.as_secs(),
            )?),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_parsed<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
