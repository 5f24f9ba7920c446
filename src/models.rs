use crate::courier_client::DeliveryType;
use crate::errors::AppError;
use crate::fulfillment::CourierFulfillment;
use crate::risk::RiskAssessment;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============ Order Model ============

/// Order record as exposed by the order store.
///
/// Only the fields this service reads or proposes updates for are modelled;
/// the store owns the record and everything else on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    /// Invoice number sent to the courier; unique per order.
    pub invoice: String,
    pub customer_name: String,
    pub phone: String,
    pub shipping_address: String,
    /// Amount the courier collects on delivery.
    pub total: BigDecimal,
    pub note: Option<String>,
    pub fraud_checked: bool,
    pub fraud_check_result: Option<FraudCheckResult>,
    pub fraud_check_at: Option<DateTime<Utc>>,
    pub courier: CourierFulfillment,
}

impl Order {
    /// Replaces any earlier fraud check with `result`.
    pub fn record_fraud_check(&mut self, result: FraudCheckResult) {
        self.fraud_checked = true;
        self.fraud_check_at = Some(result.checked_at());
        self.fraud_check_result = Some(result);
    }
}

// ============ Fraud Check Records ============

/// Stored and returned outcome of a fraud check.
///
/// Serializes as `{"success": true, ...assessment}` or
/// `{"success": false, "error": ..., "message"?: ..., "checkedAt": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudCheckResult {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: FraudCheckOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FraudCheckOutcome {
    Assessed(RiskAssessment),
    Failed(FraudCheckFailure),
}

/// Marker left on an order whose fraud check reached the upstream but failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudCheckFailure {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl FraudCheckResult {
    pub fn assessed(assessment: RiskAssessment) -> Self {
        Self {
            success: true,
            outcome: FraudCheckOutcome::Assessed(assessment),
        }
    }

    pub fn failed(error: &AppError, checked_at: DateTime<Utc>) -> Self {
        Self {
            success: false,
            outcome: FraudCheckOutcome::Failed(FraudCheckFailure {
                error: error.kind().to_string(),
                message: error.public_message(),
                checked_at,
            }),
        }
    }

    pub fn checked_at(&self) -> DateTime<Utc> {
        match &self.outcome {
            FraudCheckOutcome::Assessed(a) => a.checked_at,
            FraudCheckOutcome::Failed(f) => f.checked_at,
        }
    }

    pub fn assessment(&self) -> Option<&RiskAssessment> {
        match &self.outcome {
            FraudCheckOutcome::Assessed(a) => Some(a),
            FraudCheckOutcome::Failed(_) => None,
        }
    }
}

// ============ API Request/Response Models ============

#[derive(Debug, Clone, Deserialize)]
pub struct CheckFraudRequest {
    pub phone: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    #[serde(default)]
    pub delivery_type: DeliveryType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourierStatusResponse {
    pub delivery_status: String,
    pub tracking_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub current_balance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;
    use serde_json::json;

    #[test]
    fn test_success_result_shape() {
        let assessment = normalize("01774226088", &json!({"success_ratio": 0.8}));
        let json = serde_json::to_value(FraudCheckResult::assessed(assessment)).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["riskLevel"], "low");
        assert_eq!(json["successRatio"], 80.0);
        assert!(json.get("checkedAt").is_some());
    }

    #[test]
    fn test_failure_result_shape() {
        let err = AppError::UpstreamError {
            message: Some("quota exceeded".to_string()),
            detail: "429 Too Many Requests".to_string(),
        };
        let json = serde_json::to_value(FraudCheckResult::failed(&err, Utc::now())).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Upstream service error");
        assert_eq!(json["message"], "quota exceeded");
        assert!(json.get("riskLevel").is_none());
        assert!(!json.to_string().contains("429"));
    }

    #[test]
    fn test_stored_results_read_back() {
        let assessment = normalize(
            "01774226088",
            &json!({"courierData": {"Pathao": {"total_parcel": 3, "success_ratio": 0.5}}, "total_orders": 3}),
        );
        let ok = FraudCheckResult::assessed(assessment);
        let stored = serde_json::to_value(&ok).unwrap();
        let back: FraudCheckResult = serde_json::from_value(stored).unwrap();
        assert_eq!(back, ok);

        let failed = FraudCheckResult::failed(&AppError::upstream("boom"), Utc::now());
        let stored = serde_json::to_value(&failed).unwrap();
        let back: FraudCheckResult = serde_json::from_value(stored).unwrap();
        assert_eq!(back, failed);
        assert!(back.assessment().is_none());
    }

    #[test]
    fn test_stored_result_tier_follows_ratio() {
        let stored = json!({
            "success": true,
            "phone": "01774226088",
            "riskLevel": "low",
            "successRatio": 20.0,
            "summary": {"name": "Summary", "success_ratio": 20.0},
            "checkedAt": "2024-03-01T10:00:00Z"
        });
        let back: FraudCheckResult = serde_json::from_value(stored).unwrap();
        let assessment = back.assessment().unwrap();
        assert_eq!(assessment.risk_tier(), crate::risk::RiskTier::High);
        assert_eq!(serde_json::to_value(&back).unwrap()["riskLevel"], "high");

        let failure = json!({
            "success": false,
            "error": "Upstream service error",
            "checkedAt": "2024-03-01T10:00:00Z"
        });
        let back: FraudCheckResult = serde_json::from_value(failure).unwrap();
        assert!(back.assessment().is_none());
    }

    #[test]
    fn test_dispatch_request_defaults_to_home() {
        let req: DispatchRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(req.delivery_type, DeliveryType::Home);
        let req: DispatchRequest = serde_json::from_value(json!({"deliveryType": "hub"})).unwrap();
        assert_eq!(req.delivery_type, DeliveryType::Hub);
    }
}
