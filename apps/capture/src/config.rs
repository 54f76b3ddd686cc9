use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::capture::IdempotencyPolicy;

/// Popup host configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL shared by the extraction and persistence services.
    pub backend_url: String,
    pub devtools_url: String,
    pub http_timeout: Duration,
    pub idempotency: IdempotencyPolicy,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let backend_url = get("BACKEND_URL")
            .filter(|v| !v.trim().is_empty())
            .with_context(|| "Required environment variable 'BACKEND_URL' is not set")?;

        let http_timeout = match get("HTTP_TIMEOUT_SECS") {
            Some(v) => v
                .parse::<u64>()
                .context("HTTP_TIMEOUT_SECS must be a whole number of seconds")?,
            None => 30,
        };

        let idempotency = match get("CAPTURE_IDEMPOTENCY") {
            Some(v) => v.parse::<IdempotencyPolicy>().map_err(|e| anyhow!(e))?,
            None => IdempotencyPolicy::default(),
        };

        Ok(Config {
            backend_url: backend_url.trim().trim_end_matches('/').to_string(),
            devtools_url: get("DEVTOOLS_URL")
                .unwrap_or_else(|| "http://127.0.0.1:9222".to_string()),
            http_timeout: Duration::from_secs(http_timeout),
            idempotency,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}
