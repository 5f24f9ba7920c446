//! Risk tiers and the canonical risk record.
//!
//! A [`RiskAssessment`] is only built through [`RiskAssessment::new`], which
//! derives the tier from the success ratio. The tier has no setter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ratio below which a subject is high risk.
pub const HIGH_RISK_BELOW: f64 = 50.0;
/// Ratio from which a subject is low risk.
pub const LOW_RISK_FROM: f64 = 75.0;

/// Coarse classification of a phone number's delivery reliability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }
}

/// Maps a success ratio (0-100) to a tier. Bands include their lower bound.
pub fn classify(success_ratio: f64) -> RiskTier {
    if success_ratio >= LOW_RISK_FROM {
        RiskTier::Low
    } else if success_ratio >= HIGH_RISK_BELOW {
        RiskTier::Medium
    } else {
        // NaN lands here as well
        RiskTier::High
    }
}

/// Same as [`classify`], with an undefined ratio counted as 0.
pub fn classify_optional(success_ratio: Option<f64>) -> RiskTier {
    classify(success_ratio.unwrap_or(0.0))
}

/// Parcel statistics for one courier, or the aggregate across couriers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourierStats {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_parcel: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_parcel: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_parcel: Option<u64>,
    /// Always 0-100; an undefined upstream ratio is stored as 0.
    pub success_ratio: f64,
}

/// Canonical outcome of one risk lookup, keyed by phone number.
///
/// Reading a stored record re-derives the tier from the ratio; a stored
/// `riskLevel` is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredAssessment")]
pub struct RiskAssessment {
    pub phone: String,
    #[serde(rename = "riskLevel")]
    risk_tier: RiskTier,
    /// `None` when the upstream ratio could not be parsed.
    pub success_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_orders: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_orders: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_orders: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraud_score: Option<f64>,
    #[serde(
        rename = "courierData",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub courier_breakdown: BTreeMap<String, CourierStats>,
    pub summary: CourierStats,
    pub checked_at: DateTime<Utc>,
}

/// Counts and ratio for a [`RiskAssessment`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskFigures {
    pub success_ratio: Option<f64>,
    pub total_orders: Option<u64>,
    pub successful_orders: Option<u64>,
    pub failed_orders: Option<u64>,
    pub fraud_score: Option<f64>,
}

impl RiskAssessment {
    pub fn new(
        phone: impl Into<String>,
        figures: RiskFigures,
        courier_breakdown: BTreeMap<String, CourierStats>,
        summary: CourierStats,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            phone: phone.into(),
            risk_tier: classify_optional(figures.success_ratio),
            success_ratio: figures.success_ratio,
            total_orders: figures.total_orders,
            successful_orders: figures.successful_orders,
            failed_orders: figures.failed_orders,
            fraud_score: figures.fraud_score,
            courier_breakdown,
            summary,
            checked_at,
        }
    }

    pub fn risk_tier(&self) -> RiskTier {
        self.risk_tier
    }
}

/// Wire form of a [`RiskAssessment`] without the derived tier.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredAssessment {
    phone: String,
    success_ratio: Option<f64>,
    #[serde(default)]
    total_orders: Option<u64>,
    #[serde(default)]
    successful_orders: Option<u64>,
    #[serde(default)]
    failed_orders: Option<u64>,
    #[serde(default)]
    fraud_score: Option<f64>,
    #[serde(rename = "courierData", default)]
    courier_breakdown: BTreeMap<String, CourierStats>,
    summary: CourierStats,
    checked_at: DateTime<Utc>,
}

impl From<StoredAssessment> for RiskAssessment {
    fn from(stored: StoredAssessment) -> Self {
        RiskAssessment::new(
            stored.phone,
            RiskFigures {
                success_ratio: stored.success_ratio,
                total_orders: stored.total_orders,
                successful_orders: stored.successful_orders,
                failed_orders: stored.failed_orders,
                fraud_score: stored.fraud_score,
            },
            stored.courier_breakdown,
            stored.summary,
            stored.checked_at,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(classify(49.999), RiskTier::High);
        assert_eq!(classify(50.0), RiskTier::Medium);
        assert_eq!(classify(74.999), RiskTier::Medium);
        assert_eq!(classify(75.0), RiskTier::Low);
    }

    #[test]
    fn test_extremes() {
        assert_eq!(classify(0.0), RiskTier::High);
        assert_eq!(classify(100.0), RiskTier::Low);
        assert_eq!(classify(f64::NAN), RiskTier::High);
    }

    #[test]
    fn test_undefined_ratio_is_high() {
        assert_eq!(classify_optional(None), RiskTier::High);
        assert_eq!(classify_optional(Some(80.0)), RiskTier::Low);
    }

    #[test]
    fn test_tier_follows_ratio() {
        let summary = CourierStats {
            name: "Summary".to_string(),
            logo: None,
            total_parcel: None,
            success_parcel: None,
            cancelled_parcel: None,
            success_ratio: 60.0,
        };
        let assessment = RiskAssessment::new(
            "01774226088",
            RiskFigures {
                success_ratio: Some(60.0),
                ..Default::default()
            },
            BTreeMap::new(),
            summary,
            Utc::now(),
        );
        assert_eq!(assessment.risk_tier(), RiskTier::Medium);

        let json = serde_json::to_value(&assessment).unwrap();
        assert_eq!(json["riskLevel"], "medium");
        assert_eq!(json["successRatio"], 60.0);
        assert!(json.get("courierData").is_none());
        assert!(json.get("totalOrders").is_none());
    }

    #[test]
    fn test_stored_tier_is_recomputed() {
        let stored = serde_json::json!({
            "phone": "01774226088",
            "riskLevel": "low",
            "successRatio": 20.0,
            "totalOrders": 5,
            "summary": {"name": "Summary", "success_ratio": 20.0},
            "checkedAt": "2024-03-01T10:00:00Z"
        });
        let assessment: RiskAssessment = serde_json::from_value(stored).unwrap();
        assert_eq!(assessment.risk_tier(), RiskTier::High);
        assert_eq!(assessment.total_orders, Some(5));

        let undefined = serde_json::json!({
            "phone": "01774226088",
            "riskLevel": "medium",
            "successRatio": null,
            "summary": {"name": "Summary", "success_ratio": 0.0},
            "checkedAt": "2024-03-01T10:00:00Z"
        });
        let assessment: RiskAssessment = serde_json::from_value(undefined).unwrap();
        assert_eq!(assessment.risk_tier(), RiskTier::High);
        assert_eq!(assessment.success_ratio, None);
    }
}
