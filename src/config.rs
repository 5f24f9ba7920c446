use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Bounded timeout applied to every upstream call.
    pub upstream_timeout_secs: u64,
    // Env fallback credentials; the settings table takes precedence.
    pub fraud_check_api_key: Option<String>,
    pub fraud_check_base_url: Option<String>,
    pub steadfast_api_key: Option<String>,
    pub steadfast_secret_key: Option<String>,
    pub steadfast_base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            upstream_timeout_secs: std::env::var("UPSTREAM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| {
                    anyhow::anyhow!("UPSTREAM_TIMEOUT_SECS must be a positive number of seconds")
                })?,
            fraud_check_api_key: optional_var("FRAUD_CHECK_API_KEY"),
            fraud_check_base_url: optional_url("FRAUD_CHECK_BASE_URL")?,
            steadfast_api_key: optional_var("STEADFAST_API_KEY"),
            steadfast_secret_key: optional_var("STEADFAST_SECRET_KEY"),
            steadfast_base_url: optional_url("STEADFAST_BASE_URL")?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Database URL: {}...", url_prefix(&config.database_url));
        if config.fraud_check_api_key.is_none() {
            tracing::warn!("FRAUD_CHECK_API_KEY not set, relying on settings table");
        }
        if config.steadfast_api_key.is_none() || config.steadfast_secret_key.is_none() {
            tracing::warn!("Steadfast env credentials incomplete, relying on settings table");
        }
        tracing::debug!("Upstream timeout: {}s", config.upstream_timeout_secs);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

/// First 20 characters of a URL, for log lines.
fn url_prefix(url: &str) -> String {
    url.chars().take(20).collect()
}

fn optional_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn optional_url(key: &str) -> anyhow::Result<Option<String>> {
    match optional_var(key) {
        Some(raw) => {
            validate_base_url(&raw).map_err(|e| anyhow::anyhow!("{} {}", key, e))?;
            Ok(Some(raw))
        }
        None => Ok(None),
    }
}

/// Checks that a base URL is an absolute http(s) URL.
pub fn validate_base_url(raw: &str) -> Result<url::Url, String> {
    let parsed = url::Url::parse(raw).map_err(|e| format!("is not a valid URL: {}", e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(format!("must use http or https, got {}", other)),
    }
}
