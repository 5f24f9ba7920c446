//! Normalization of risk-lookup payloads.
//!
//! The risk-lookup service answers in more than one shape: flat
//! `{success_ratio, total_orders, ...}` fields (snake_case or camelCase), or a
//! `courierData` map with per-courier entries and a `summary`. Everything here
//! is total: garbled fields degrade to "absent", never to a panic.

use crate::risk::{CourierStats, RiskAssessment, RiskFigures};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const SUMMARY_KEY: &str = "summary";
const COURIER_DATA_KEY: &str = "courierData";
const SUMMARY_NAME: &str = "Summary";

/// Converts a raw risk-lookup payload into a [`RiskAssessment`] for `phone`,
/// stamped with the current time.
pub fn normalize(phone: &str, payload: &Value) -> RiskAssessment {
    let courier_data = payload.get(COURIER_DATA_KEY).and_then(Value::as_object);
    let summary_source = payload
        .get(SUMMARY_KEY)
        .and_then(Value::as_object)
        .or_else(|| {
            courier_data
                .and_then(|data| data.get(SUMMARY_KEY))
                .and_then(Value::as_object)
        });

    let mut figures = match summary_source {
        Some(summary) => figures_from_summary(summary),
        None => figures_from_flat(payload),
    };
    figures.fraud_score = first_field(payload, &["fraud_score", "fraudScore"]).and_then(parse_number);

    let summary = match summary_source {
        Some(summary) => courier_stats(SUMMARY_NAME, summary),
        None => CourierStats {
            name: SUMMARY_NAME.to_string(),
            logo: None,
            total_parcel: figures.total_orders,
            success_parcel: figures.successful_orders,
            cancelled_parcel: figures.failed_orders,
            success_ratio: figures.success_ratio.unwrap_or(0.0),
        },
    };

    let courier_breakdown = courier_data
        .map(courier_breakdown)
        .unwrap_or_default();

    RiskAssessment::new(phone, figures, courier_breakdown, summary, Utc::now())
}

/// Scales a raw ratio onto 0-100.
///
/// Values in `[0, 1]` are fractions and are multiplied by 100, so `1` means
/// 100%, not 1%. Anything else is taken as a percentage and clamped.
/// Unparseable or non-finite input yields `None`.
pub fn scale_ratio(raw: &Value) -> Option<f64> {
    let value = parse_number(raw)?;
    if (0.0..=1.0).contains(&value) {
        Some(value * 100.0)
    } else {
        Some(value.clamp(0.0, 100.0))
    }
}

/// Parses a count: a number or numeric string, rounded to the nearest
/// integer. Negative, non-finite or unparseable input yields `None`.
pub fn parse_count(raw: &Value) -> Option<u64> {
    let value = parse_number(raw)?.round();
    if value < 0.0 || value > u64::MAX as f64 {
        return None;
    }
    Some(value as u64)
}

/// Permissive number parsing: JSON numbers and trimmed numeric strings.
pub fn parse_number(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

fn figures_from_summary(summary: &Map<String, Value>) -> RiskFigures {
    RiskFigures {
        success_ratio: summary.get("success_ratio").and_then(scale_ratio),
        total_orders: summary.get("total_parcel").and_then(parse_count),
        successful_orders: summary.get("success_parcel").and_then(parse_count),
        failed_orders: summary.get("cancelled_parcel").and_then(parse_count),
        fraud_score: None,
    }
}

fn figures_from_flat(payload: &Value) -> RiskFigures {
    let total_orders = first_field(payload, &["total_orders", "totalOrders"]).and_then(parse_count);
    let successful_orders =
        first_field(payload, &["successful_orders", "successfulOrders"]).and_then(parse_count);
    let failed_orders =
        first_field(payload, &["failed_orders", "failedOrders"]).and_then(parse_count);

    let success_ratio = match first_field(payload, &["success_ratio", "successRatio"]) {
        Some(raw) => scale_ratio(raw),
        // No ratio field at all: derive it from the counts. The result is
        // already a percentage and skips the fraction rule.
        None => match (successful_orders, total_orders) {
            (Some(success), Some(total)) if total > 0 => {
                Some((success as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
            }
            _ => None,
        },
    };

    RiskFigures {
        success_ratio,
        total_orders,
        successful_orders,
        failed_orders,
        fraud_score: None,
    }
}

/// First present, non-null field; earlier names take precedence.
fn first_field<'a>(payload: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| payload.get(*name))
        .find(|v| !v.is_null())
}

fn courier_breakdown(data: &Map<String, Value>) -> BTreeMap<String, CourierStats> {
    data.iter()
        .filter(|(key, _)| key.as_str() != SUMMARY_KEY)
        .filter_map(|(key, value)| {
            value
                .as_object()
                .map(|entry| (key.clone(), courier_stats(key, entry)))
        })
        .collect()
}

fn courier_stats(fallback_name: &str, entry: &Map<String, Value>) -> CourierStats {
    let name = entry
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback_name)
        .to_string();
    let logo = entry
        .get("logo")
        .or_else(|| entry.get("logo_url"))
        .and_then(Value::as_str)
        .map(String::from);

    CourierStats {
        name,
        logo,
        total_parcel: entry.get("total_parcel").and_then(parse_count),
        success_parcel: entry.get("success_parcel").and_then(parse_count),
        cancelled_parcel: entry.get("cancelled_parcel").and_then(parse_count),
        success_ratio: entry
            .get("success_ratio")
            .and_then(scale_ratio)
            .unwrap_or(0.0),
    }
}
