//! Credential resolution for the upstream services.
//!
//! Credentials are resolved per call through a [`CredentialSource`] handed to
//! the orchestrator. `main` composes the settings table with the environment
//! fallback; clients never read the environment themselves.

use crate::config::Config;
use crate::errors::AppError;
use async_trait::async_trait;
use sqlx::PgPool;
use std::fmt;

/// Upstream service whose credentials are being looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceModule {
    /// Courier-history risk lookup.
    FraudChecker,
    /// Steadfast parcel courier.
    Steadfast,
}

impl ServiceModule {
    /// Key of the module in the settings table.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceModule::FraudChecker => "fraud_checker",
            ServiceModule::Steadfast => "steadfast",
        }
    }
}

impl fmt::Display for ServiceModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw credential fields for one upstream service. Any field may be absent;
/// the client decides which ones it requires.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ServiceCredentials {
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub base_url: Option<String>,
}

// Keys must never reach the logs.
impl fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ServiceCredentials {
    /// Fills every absent field from `fallback`.
    pub fn or(self, fallback: ServiceCredentials) -> ServiceCredentials {
        ServiceCredentials {
            api_key: self.api_key.or(fallback.api_key),
            secret_key: self.secret_key.or(fallback.secret_key),
            base_url: self.base_url.or(fallback.base_url),
        }
    }

    /// Returns a required field, or a `ConfigurationError` naming it.
    pub fn require<'a>(
        field: &'a Option<String>,
        module: ServiceModule,
        name: &str,
    ) -> Result<&'a str, AppError> {
        field
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AppError::ConfigurationError(format!("{} {} is not configured", module, name))
            })
    }
}

/// Capability that resolves credentials for an upstream service.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn credentials(&self, module: ServiceModule) -> Result<ServiceCredentials, AppError>;
}

/// Credentials stored in the admin settings table.
pub struct SettingsCredentials {
    pool: PgPool,
}

impl SettingsCredentials {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialSource for SettingsCredentials {
    async fn credentials(&self, module: ServiceModule) -> Result<ServiceCredentials, AppError> {
        let rows: Vec<(String, Option<String>)> = sqlx::query_as(
            "SELECT key, value FROM settings
             WHERE module = $1 AND key IN ('api_key', 'secret_key', 'base_url')",
        )
        .bind(module.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to read {} settings: {:?}", module, e);
            AppError::DatabaseError(e)
        })?;

        let mut creds = ServiceCredentials::default();
        for (key, value) in rows {
            let value = value.filter(|v| !v.trim().is_empty());
            match key.as_str() {
                "api_key" => creds.api_key = value,
                "secret_key" => creds.secret_key = value,
                "base_url" => creds.base_url = value,
                _ => {}
            }
        }

        tracing::debug!("Resolved {} credentials from settings: {:?}", module, creds);
        Ok(creds)
    }
}

/// Fixed credentials, typically taken from the environment.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    pub fraud_checker: ServiceCredentials,
    pub steadfast: ServiceCredentials,
}

impl StaticCredentials {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fraud_checker: ServiceCredentials {
                api_key: config.fraud_check_api_key.clone(),
                secret_key: None,
                base_url: config.fraud_check_base_url.clone(),
            },
            steadfast: ServiceCredentials {
                api_key: config.steadfast_api_key.clone(),
                secret_key: config.steadfast_secret_key.clone(),
                base_url: config.steadfast_base_url.clone(),
            },
        }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn credentials(&self, module: ServiceModule) -> Result<ServiceCredentials, AppError> {
        Ok(match module {
            ServiceModule::FraudChecker => self.fraud_checker.clone(),
            ServiceModule::Steadfast => self.steadfast.clone(),
        })
    }
}

/// Field-by-field merge of two sources: `primary` wins, `fallback` fills gaps.
pub struct FallbackCredentials<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> FallbackCredentials<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl<P, F> CredentialSource for FallbackCredentials<P, F>
where
    P: CredentialSource,
    F: CredentialSource,
{
    async fn credentials(&self, module: ServiceModule) -> Result<ServiceCredentials, AppError> {
        let primary = self.primary.credentials(module).await?;
        let fallback = self.fallback.credentials(module).await?;
        Ok(primary.or(fallback))
    }
}
