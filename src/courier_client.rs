use crate::credentials::{ServiceCredentials, ServiceModule};
use crate::errors::AppError;
use crate::fraud_client::upstream_message;
use bigdecimal::{BigDecimal, ToPrimitive};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// Default endpoint of the Steadfast courier API.
pub const DEFAULT_STEADFAST_BASE_URL: &str = "https://portal.packzy.com/api/v1";

/// Where the courier hands over the parcel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryType {
    /// Delivered to the recipient's address.
    #[default]
    Home,
    /// Picked up by the recipient at a courier hub.
    Hub,
}

impl DeliveryType {
    /// Numeric flag expected by the courier API.
    pub fn code(&self) -> u8 {
        match self {
            DeliveryType::Home => 0,
            DeliveryType::Hub => 1,
        }
    }
}

/// Parameters for creating a consignment.
#[derive(Debug, Clone)]
pub struct CreateOrderParams {
    pub invoice: String,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub recipient_address: String,
    /// Cash to collect on delivery.
    pub cod_amount: BigDecimal,
    pub note: Option<String>,
    pub delivery_type: DeliveryType,
}

/// Consignment created by the courier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsignmentReceipt {
    pub consignment_id: i64,
    pub tracking_code: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    consignment: Option<ConsignmentBody>,
}

#[derive(Debug, Deserialize)]
struct ConsignmentBody {
    #[serde(default)]
    consignment_id: Value,
    tracking_code: Option<String>,
    status: Option<String>,
}

/// Client for the Steadfast courier API.
///
/// Authenticates with an `Api-Key`/`Secret-Key` header pair. Like the risk
/// lookup client it is rebuilt per call and never retries.
#[derive(Clone)]
pub struct SteadfastClient {
    client: Client,
    base_url: Url,
    api_key: String,
    secret_key: String,
}

impl SteadfastClient {
    /// Creates a new `SteadfastClient`.
    ///
    /// Fails with `ConfigurationError` when the api key or secret key is
    /// missing, or the base URL cannot carry path segments.
    pub fn new(credentials: &ServiceCredentials, timeout: Duration) -> Result<Self, AppError> {
        let api_key =
            ServiceCredentials::require(&credentials.api_key, ServiceModule::Steadfast, "api key")?
                .to_string();
        let secret_key = ServiceCredentials::require(
            &credentials.secret_key,
            ServiceModule::Steadfast,
            "secret key",
        )?
        .to_string();
        let raw_base = credentials
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_STEADFAST_BASE_URL);
        let base_url = Url::parse(raw_base)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                AppError::ConfigurationError(format!(
                    "{} base URL is not a valid http(s) URL",
                    ServiceModule::Steadfast
                ))
            })?;

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            AppError::InternalError(format!("Failed to create Steadfast client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url,
            api_key,
            secret_key,
        })
    }

    /// Creates a consignment for an order.
    pub async fn create_order(
        &self,
        params: &CreateOrderParams,
    ) -> Result<ConsignmentReceipt, AppError> {
        let cod_amount = params
            .cod_amount
            .to_f64()
            .filter(|amount| amount.is_finite() && *amount >= 0.0)
            .ok_or_else(|| {
                AppError::ValidationError(format!(
                    "Invalid COD amount for invoice {}",
                    params.invoice
                ))
            })?;

        let mut body = json!({
            "invoice": params.invoice,
            "recipient_name": params.recipient_name,
            "recipient_phone": params.recipient_phone,
            "recipient_address": params.recipient_address,
            "cod_amount": cod_amount,
            "delivery_type": params.delivery_type.code(),
        });
        if let Some(note) = &params.note {
            body["note"] = json!(note);
        }

        tracing::info!(
            "Creating Steadfast consignment for invoice {} ({:?})",
            params.invoice,
            params.delivery_type
        );

        let data = self
            .send(Method::POST, &["create_order"], Some(&body))
            .await?;

        let parsed: CreateOrderResponse = serde_json::from_value(data.clone()).map_err(|e| {
            AppError::upstream(format!("Failed to parse Steadfast create_order response: {}", e))
        })?;

        let consignment = parsed.consignment.ok_or_else(|| AppError::UpstreamError {
            message: upstream_message(&data),
            detail: format!("Steadfast create_order response missing consignment: {}", data),
        })?;

        let consignment_id = parse_consignment_id(&consignment.consignment_id).ok_or_else(|| {
            AppError::upstream(format!(
                "Steadfast returned unusable consignment_id: {}",
                consignment.consignment_id
            ))
        })?;
        let tracking_code = consignment
            .tracking_code
            .filter(|code| !code.trim().is_empty())
            .ok_or_else(|| {
                AppError::upstream("Steadfast create_order response missing tracking_code")
            })?;

        tracing::info!(
            "✓ Steadfast consignment {} created for invoice {}",
            consignment_id,
            params.invoice
        );

        Ok(ConsignmentReceipt {
            consignment_id,
            tracking_code,
            status: consignment.status.unwrap_or_else(|| "in_review".to_string()),
        })
    }

    /// Current delivery status of a consignment, looked up by consignment id.
    pub async fn status_by_consignment_id(&self, consignment_id: i64) -> Result<String, AppError> {
        tracing::info!("Steadfast status lookup by consignment {}", consignment_id);
        let data = self
            .send(
                Method::GET,
                &["status_by_cid", &consignment_id.to_string()],
                None,
            )
            .await?;
        delivery_status(&data)
    }

    /// Current delivery status of a consignment, looked up by tracking code.
    pub async fn status_by_tracking_code(&self, tracking_code: &str) -> Result<String, AppError> {
        tracing::info!("Steadfast status lookup by tracking code {}", tracking_code);
        let data = self
            .send(Method::GET, &["status_by_trackingcode", tracking_code], None)
            .await?;
        delivery_status(&data)
    }

    /// Current account balance with the courier.
    pub async fn balance(&self) -> Result<f64, AppError> {
        let data = self.send(Method::GET, &["get_balance"], None).await?;
        data.get("current_balance")
            .and_then(crate::normalizer::parse_number)
            .ok_or_else(|| AppError::upstream("Steadfast balance response missing current_balance"))
    }

    /// `base_url` with `segments` appended, each percent-encoded as a single
    /// path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AppError::ConfigurationError(format!(
                    "{} base URL cannot carry a path",
                    ServiceModule::Steadfast
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> Result<Value, AppError> {
        let url = self.endpoint(segments)?;
        let path = segments.join("/");

        let mut request = self
            .client
            .request(method, url)
            .header("Api-Key", &self.api_key)
            .header("Secret-Key", &self.secret_key)
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            let err = AppError::from(e);
            tracing::warn!("Steadfast request to {} failed: {}", path, err);
            err
        })?;

        let status = response.status();
        let text = response.text().await.map_err(AppError::from)?;
        let parsed = serde_json::from_str::<Value>(&text);

        if !status.is_success() {
            tracing::warn!("Steadfast {} returned {}", path, status);
            return Err(AppError::UpstreamError {
                message: parsed.ok().as_ref().and_then(upstream_message),
                detail: format!("Steadfast {} returned {}: {}", path, status, text),
            });
        }

        let data = parsed.map_err(|e| {
            AppError::upstream(format!("Failed to parse Steadfast {} response: {}", path, e))
        })?;

        // The API also reports failures inside 2xx bodies via a numeric status.
        if let Some(code) = data.get("status").and_then(Value::as_i64) {
            if code != 200 {
                tracing::warn!("Steadfast {} reported status {}", path, code);
                return Err(AppError::UpstreamError {
                    message: upstream_message(&data),
                    detail: format!("Steadfast {} reported status {}: {}", path, code, data),
                });
            }
        }

        Ok(data)
    }
}

fn delivery_status(data: &Value) -> Result<String, AppError> {
    data.get("delivery_status")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| AppError::UpstreamError {
            message: upstream_message(data),
            detail: format!("Steadfast status response missing delivery_status: {}", data),
        })
}

fn parse_consignment_id(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_both_keys() {
        let only_key = ServiceCredentials {
            api_key: Some("key".to_string()),
            ..Default::default()
        };
        let result = SteadfastClient::new(&only_key, Duration::from_secs(10));
        match result {
            Err(AppError::ConfigurationError(msg)) => assert!(msg.contains("secret key")),
            _ => panic!("expected configuration error"),
        }
    }

    fn client_at(base_url: &str) -> SteadfastClient {
        let creds = ServiceCredentials {
            api_key: Some("key".to_string()),
            secret_key: Some("secret".to_string()),
            base_url: Some(base_url.to_string()),
        };
        SteadfastClient::new(&creds, Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn test_tracking_code_is_one_path_segment() {
        let client = client_at("https://courier.example/api/v1");
        let url = client
            .endpoint(&["status_by_trackingcode", "AB C/1"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://courier.example/api/v1/status_by_trackingcode/AB%20C%2F1"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let with_slash = client_at("https://courier.example/api/v1/");
        assert_eq!(
            with_slash.endpoint(&["get_balance"]).unwrap().as_str(),
            "https://courier.example/api/v1/get_balance"
        );
        let default = client_at("");
        assert_eq!(
            default.endpoint(&["status_by_cid", "42"]).unwrap().as_str(),
            "https://portal.packzy.com/api/v1/status_by_cid/42"
        );
    }

    #[test]
    fn test_unusable_base_url_is_configuration_error() {
        let creds = ServiceCredentials {
            api_key: Some("key".to_string()),
            secret_key: Some("secret".to_string()),
            base_url: Some("mailto:ops@example.com".to_string()),
        };
        assert!(matches!(
            SteadfastClient::new(&creds, Duration::from_secs(10)),
            Err(AppError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_delivery_type_codes() {
        assert_eq!(DeliveryType::Home.code(), 0);
        assert_eq!(DeliveryType::Hub.code(), 1);
        assert_eq!(DeliveryType::default(), DeliveryType::Home);
        let parsed: DeliveryType = serde_json::from_value(json!("hub")).unwrap();
        assert_eq!(parsed, DeliveryType::Hub);
    }

    #[test]
    fn test_consignment_id_parsing() {
        assert_eq!(parse_consignment_id(&json!(1424107)), Some(1424107));
        assert_eq!(parse_consignment_id(&json!("1424107")), Some(1424107));
        assert_eq!(parse_consignment_id(&json!(0)), None);
        assert_eq!(parse_consignment_id(&json!(null)), None);
    }

    #[test]
    fn test_delivery_status_extraction() {
        assert_eq!(
            delivery_status(&json!({"status": 200, "delivery_status": "delivered"})).unwrap(),
            "delivered"
        );
        assert!(delivery_status(&json!({"status": 200})).is_err());
    }
}
