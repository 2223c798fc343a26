//! Money and quantity normalization for OCR and model output
//!
//! OCR fields arrive as loosely formatted strings (`"$1,234.56"`, `"2 "`, `"N/A"`).
//! Every parser here is total: a garbled field yields the type's default
//! (`0` for money, `1` for quantity) so one bad field never aborts a receipt.

use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Leading currency symbols/codes and trailing flags (`"USD 3.50"`, `"3.50 F"`)
fn decoration() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^0-9.\-]+|[^0-9.]+$").expect("valid regex"))
}

/// Strip currency decoration, thousands separators, and whitespace
fn clean_numeric(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    decoration().replace_all(&compact, "").into_owned()
}

/// Parse a decimal amount, returning `None` when the token is not numeric
pub fn try_parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned = clean_numeric(raw);
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Parse an OCR price field into a non-negative exact decimal
///
/// Unparsable input yields zero; negative amounts (refund lines, discounts)
/// clamp to zero since a line item price is never negative.
pub fn parse_price(raw: &str) -> Decimal {
    try_parse_decimal(raw)
        .map(|d| d.max(Decimal::ZERO))
        .unwrap_or(Decimal::ZERO)
}

/// Parse an OCR quantity field into a positive integer
///
/// Fractional quantities (`"2.0"`) truncate; anything unparsable or
/// non-positive yields 1.
pub fn parse_quantity(raw: &str) -> u32 {
    let cleaned = clean_numeric(raw);
    if let Ok(n) = cleaned.parse::<u32>() {
        return n.max(1);
    }
    Decimal::from_str(&cleaned)
        .ok()
        .and_then(|d| d.trunc().to_u32())
        .filter(|n| *n > 0)
        .unwrap_or(1)
}

/// Convert an `f64` into an exact decimal via its shortest textual form
///
/// Going through the string representation keeps `0.1` as `0.1` rather than
/// the binary expansion `0.1000000000000000055511151231`.
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(value))
}

/// Coerce an untyped JSON value (number or numeric string) into a decimal
pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else if let Some(u) = n.as_u64() {
                Some(Decimal::from(u))
            } else {
                n.as_f64().and_then(decimal_from_f64)
            }
        }
        Value::String(s) => try_parse_decimal(s),
        _ => None,
    }
}

/// Serde helper: any JSON value into a non-negative decimal, defaulting to zero
pub fn lenient_decimal<'de, D>(deserializer: D) -> std::result::Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(decimal_from_value(&value)
        .map(|d| d.max(Decimal::ZERO))
        .unwrap_or(Decimal::ZERO))
}

/// Serde helper: optional decimal that tolerates strings and garbage
pub fn lenient_decimal_opt<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(decimal_from_value))
}

/// Serde helper: any JSON value into a non-negative integer, defaulting to zero
pub fn lenient_u32<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(decimal_from_value(&value)
        .and_then(|d| d.max(Decimal::ZERO).round().to_u32())
        .unwrap_or(0))
}

/// Serde helper: quantity semantics (positive, defaulting to 1)
pub fn lenient_quantity<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => parse_quantity(&s),
        Some(v) => decimal_from_value(&v)
            .and_then(|d| d.trunc().to_u32())
            .filter(|n| *n > 0)
            .unwrap_or(1),
        None => 1,
    })
}

/// Serde helper: a string field the model may emit as a number or null
pub fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}

/// Serde helper: a list of strings, skipping anything that is not text
pub fn lenient_strings<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_price_decorated() {
        assert_eq!(parse_price("$1,234.56"), Decimal::new(123456, 2));
        assert_eq!(parse_price(" 3.50 "), Decimal::new(350, 2));
        assert_eq!(parse_price("USD 4.00"), Decimal::new(400, 2));
        assert_eq!(parse_price("2.99 F"), Decimal::new(299, 2));
    }

    #[test]
    fn test_parse_price_garbage_defaults_to_zero() {
        for raw in ["", "N/A", "$", "--", "abc", "1.2.3"] {
            assert_eq!(parse_price(raw), Decimal::ZERO, "input {:?}", raw);
        }
    }

    #[test]
    fn test_parse_price_negative_clamps() {
        assert_eq!(parse_price("-1.25"), Decimal::ZERO);
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("3"), 3);
        assert_eq!(parse_quantity(" 2 "), 2);
        assert_eq!(parse_quantity("2.0"), 2);
        assert_eq!(parse_quantity("0"), 1);
        assert_eq!(parse_quantity(""), 1);
        assert_eq!(parse_quantity("lots"), 1);
        assert_eq!(parse_quantity("-4"), 1);
    }

    #[test]
    fn test_decimal_from_value() {
        assert_eq!(decimal_from_value(&json!(7)), Some(Decimal::from(7)));
        assert_eq!(decimal_from_value(&json!(0.1)), Some(Decimal::new(1, 1)));
        assert_eq!(decimal_from_value(&json!("$12.00")), Some(Decimal::new(1200, 2)));
        assert_eq!(decimal_from_value(&json!(null)), None);
        assert_eq!(decimal_from_value(&json!([1])), None);
    }

    #[derive(Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "lenient_decimal")]
        price: Decimal,
        #[serde(default = "one", deserialize_with = "lenient_quantity")]
        quantity: u32,
        #[serde(deserialize_with = "lenient_u32")]
        calories: u32,
        #[serde(deserialize_with = "lenient_strings")]
        tags: Vec<String>,
    }

    fn one() -> u32 {
        1
    }

    #[test]
    fn test_lenient_helpers() {
        let probe: Probe = serde_json::from_value(json!({
            "price": "$2.50",
            "quantity": "3",
            "calories": 412.6,
            "tags": ["a", 5, null, ""]
        }))
        .unwrap();
        assert_eq!(probe.price, Decimal::new(250, 2));
        assert_eq!(probe.quantity, 3);
        assert_eq!(probe.calories, 413);
        assert_eq!(probe.tags, vec!["a".to_string(), "5".to_string()]);

        let probe: Probe =
            serde_json::from_value(json!({"price": "free", "calories": null, "tags": null}))
                .unwrap();
        assert_eq!(probe.price, Decimal::ZERO);
        assert_eq!(probe.quantity, 1);
        assert_eq!(probe.calories, 0);
        assert!(probe.tags.is_empty());
    }
}
