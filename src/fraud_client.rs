use crate::credentials::{ServiceCredentials, ServiceModule};
use crate::errors::AppError;
use crate::validation::phone_fingerprint;
use serde_json::{json, Value};
use std::time::Duration;

/// Default endpoint of the courier-history risk lookup service.
pub const DEFAULT_FRAUD_CHECK_BASE_URL: &str = "https://bdcourier.com/api";

/// Risk-lookup response exactly as received.
///
/// The body shape is not stable between deployments, so it stays untyped
/// until [`crate::normalizer::normalize`] turns it into a `RiskAssessment`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRiskPayload {
    /// False when a 2xx body still reports failure.
    pub success: bool,
    pub body: Value,
}

impl RawRiskPayload {
    pub fn from_body(body: Value) -> Self {
        let failed_flag = body.get("success").and_then(Value::as_bool) == Some(false);
        let failed_status = match body.get("status") {
            Some(Value::String(s)) => {
                matches!(s.to_ascii_lowercase().as_str(), "error" | "failed" | "false")
            }
            Some(Value::Bool(b)) => !b,
            _ => false,
        };

        Self {
            success: !(failed_flag || failed_status),
            body,
        }
    }

    /// Message the upstream attached to a failed body, if any.
    pub fn upstream_message(&self) -> Option<String> {
        upstream_message(&self.body)
    }
}

/// Pulls a human-readable message out of an upstream JSON body.
pub fn upstream_message(body: &Value) -> Option<String> {
    ["message", "error", "errors"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Object(_) | Value::Array(_) => Some(v.to_string()),
            _ => None,
        })
}

/// Client for the courier-history risk lookup service.
///
/// Stateless: built per call from freshly resolved credentials and dropped
/// afterwards. Performs exactly one request per operation and never retries.
#[derive(Clone)]
pub struct FraudCheckClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FraudCheckClient {
    /// Creates a new `FraudCheckClient`.
    ///
    /// # Arguments
    ///
    /// * `credentials` - Resolved credentials; `api_key` is required.
    /// * `timeout` - Upper bound for the whole request.
    pub fn new(credentials: &ServiceCredentials, timeout: Duration) -> Result<Self, AppError> {
        let api_key =
            ServiceCredentials::require(&credentials.api_key, ServiceModule::FraudChecker, "api key")?
                .to_string();
        let base_url = credentials
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_FRAUD_CHECK_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create fraud check client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Looks up the courier history of a phone number.
    ///
    /// # Arguments
    ///
    /// * `phone` - Normalized 11-digit phone number.
    ///
    /// # Returns
    ///
    /// * `Result<RawRiskPayload, AppError>` - The verbatim payload with its success flag,
    ///   or `UpstreamError` on transport failure, non-2xx status or invalid JSON.
    pub async fn lookup(&self, phone: &str) -> Result<RawRiskPayload, AppError> {
        let url = format!("{}/courier-check", self.base_url);
        tracing::info!("Fraud check lookup for {}", phone_fingerprint(phone));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({ "phone": phone }))
            .send()
            .await
            .map_err(|e| {
                let err = AppError::from(e);
                tracing::warn!("Fraud check request failed: {}", err);
                err
            })?;

        let status = response.status();
        let text = response.text().await.map_err(AppError::from)?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .as_ref()
                .and_then(upstream_message);
            tracing::warn!("Fraud check returned {}", status);
            return Err(AppError::UpstreamError {
                message,
                detail: format!("Fraud check returned {}: {}", status, text),
            });
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            AppError::upstream(format!("Failed to parse fraud check response: {}", e))
        })?;

        let payload = RawRiskPayload::from_body(body);
        tracing::info!(
            "Fraud check for {} answered (success flag: {})",
            phone_fingerprint(phone),
            payload.success
        );
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_api_key() {
        let result = FraudCheckClient::new(&ServiceCredentials::default(), Duration::from_secs(10));
        assert!(matches!(result, Err(AppError::ConfigurationError(_))));
    }

    #[test]
    fn test_client_creation_uses_default_base_url() {
        let creds = ServiceCredentials {
            api_key: Some("key".to_string()),
            ..Default::default()
        };
        let client = FraudCheckClient::new(&creds, Duration::from_secs(10)).unwrap();
        assert_eq!(client.base_url, DEFAULT_FRAUD_CHECK_BASE_URL);
    }

    #[test]
    fn test_body_level_failure_flags() {
        assert!(RawRiskPayload::from_body(json!({"courierData": {}})).success);
        assert!(RawRiskPayload::from_body(json!({"status": "success"})).success);
        assert!(!RawRiskPayload::from_body(json!({"success": false})).success);
        assert!(!RawRiskPayload::from_body(json!({"status": "error"})).success);
        assert!(!RawRiskPayload::from_body(json!({"status": false})).success);
    }

    #[test]
    fn test_upstream_message_extraction() {
        assert_eq!(
            upstream_message(&json!({"message": " quota exceeded "})).as_deref(),
            Some("quota exceeded")
        );
        assert_eq!(
            upstream_message(&json!({"error": "invalid phone"})).as_deref(),
            Some("invalid phone")
        );
        assert_eq!(upstream_message(&json!({"message": ""})), None);
        assert_eq!(upstream_message(&json!({"status": 500})), None);
    }
}
