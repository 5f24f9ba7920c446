/// Input validation shared by the HTTP handlers and the orchestrator.
///
/// Phone numbers are the subject key for risk lookups, so they are checked and
/// normalized before any upstream call is made. Logs carry a fingerprint of
/// the number rather than the number itself.
use crate::errors::AppError;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

fn local_mobile_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Bangladeshi mobile: 01 + operator digit 3-9 + 8 digits
    RE.get_or_init(|| Regex::new(r"^01[3-9]\d{8}$").expect("static regex"))
}

/// Validate and normalize a Bangladeshi mobile number.
///
/// Accepts `01XXXXXXXXX`, `8801XXXXXXXXX` and `+8801XXXXXXXXX`, with spaces,
/// dashes or parentheses as separators. Returns the 11-digit local form that
/// both upstream services expect.
pub fn validate_bd_phone(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError(
            "Phone number is required".to_string(),
        ));
    }

    if trimmed
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')')))
    {
        tracing::warn!("❌ Phone with unexpected characters rejected");
        return Err(AppError::ValidationError(
            "Phone number contains invalid characters".to_string(),
        ));
    }

    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    let local = if let Some(rest) = digits.strip_prefix("880") {
        format!("0{}", rest.trim_start_matches('0'))
    } else {
        digits
    };

    if !local_mobile_regex().is_match(&local) {
        tracing::warn!("❌ Invalid BD phone number: {}", phone_fingerprint(&local));
        return Err(AppError::ValidationError(
            "Phone number must be a valid Bangladeshi mobile number".to_string(),
        ));
    }

    Ok(local)
}

/// Short SHA-256 fingerprint of a phone number for log lines.
pub fn phone_fingerprint(phone: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(phone.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("phone#{}", &digest[..12])
}

/// Validates an order id taken from a request path.
pub fn validate_order_id(order_id: i64) -> Result<i64, AppError> {
    if order_id <= 0 {
        return Err(AppError::ValidationError(format!(
            "Invalid order id: {}",
            order_id
        )));
    }
    Ok(order_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_format() {
        assert_eq!(validate_bd_phone("01774226088").unwrap(), "01774226088");
        assert_eq!(validate_bd_phone(" 01774-226088 ").unwrap(), "01774226088");
    }

    #[test]
    fn test_country_code_forms() {
        assert_eq!(validate_bd_phone("+8801774226088").unwrap(), "01774226088");
        assert_eq!(validate_bd_phone("8801774226088").unwrap(), "01774226088");
        assert_eq!(
            validate_bd_phone("+880 1774-226088").unwrap(),
            "01774226088"
        );
    }

    #[test]
    fn test_rejects_malformed() {
        for raw in ["", "   ", "0177422608", "017742260889", "01274226088", "abc", "0177422608a"] {
            let err = validate_bd_phone(raw).unwrap_err();
            assert!(
                matches!(err, AppError::ValidationError(_)),
                "expected validation error for {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_fingerprint_is_stable_and_hides_number() {
        let a = phone_fingerprint("01774226088");
        let b = phone_fingerprint("01774226088");
        assert_eq!(a, b);
        assert!(!a.contains("01774226088"));
        assert_eq!(a.len(), "phone#".len() + 12);
    }

    #[test]
    fn test_order_id() {
        assert_eq!(validate_order_id(42).unwrap(), 42);
        assert!(validate_order_id(0).is_err());
        assert!(validate_order_id(-3).is_err());
    }
}
