//! Value parsers for loosely-typed Armtek payloads.
//!
//! Armtek returns almost every scalar as a string: prices with grouping
//! separators, availability such as `">100"` or `"ЕСТЬ"`, flags as `"X"`,
//! and dates in compact `YYYYMMDD[HHMMSS]` form. The helpers here turn those
//! into typed values. Lenient callers get `None` for unusable input; strict
//! callers get [`ArmtekError::ResponseFormat`].

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Map, Value};

use super::ArmtekError;

/// Token Armtek uses for "in stock, quantity undisclosed".
const IN_STOCK_TOKEN: &str = "есть";

const TRUE_TOKENS: &[&str] = &["1", "y", "yes", "true", "x", "on", "t", "default"];
const FALSE_TOKENS: &[&str] = &["0", "n", "no", "false", "off", "f"];

// A number immediately followed by a whole unit word. Longer spellings come
// first so the alternation does not stop at a prefix.
static WEIGHT_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // Static pattern
    Regex::new(
        r"(-?\d+(?:\.\d+)?)\s*(килограмм\w*|кг|kilograms?|kilo|kg|грамм\w*|гр|г|grams?|g)\b",
    )
    .unwrap()
});

static LENGTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // Static pattern
    Regex::new(
        r"(-?\d+(?:\.\d+)?)\s*(миллиметр\w*|мм|millimet\w*|mm|сантиметр\w*|см|centimet\w*|cm)\b",
    )
    .unwrap()
});

// =============================================================================
// Field lookup
// =============================================================================

/// Render a scalar JSON value as trimmed text.
///
/// Returns `None` for `null`, empty strings, arrays and objects.
#[must_use]
pub fn value_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// First alias with a usable (non-null, non-blank) value.
#[must_use]
pub fn first_value<'a>(map: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|alias| map.get(*alias))
        .find(|value| match value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
}

/// First alias rendered as text.
#[must_use]
pub fn first_text(map: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    value_text(first_value(map, aliases))
}

/// Like [`first_text`], but a missing field is a format error.
///
/// # Errors
///
/// Returns `ArmtekError::ResponseFormat` naming `field` when no alias has a value.
pub fn require_text(
    map: &Map<String, Value>,
    aliases: &[&str],
    field: &str,
) -> Result<String, ArmtekError> {
    first_text(map, aliases)
        .ok_or_else(|| ArmtekError::ResponseFormat(format!("missing required field {field}")))
}

// =============================================================================
// Numbers
// =============================================================================

/// Parse a decimal that may carry an inequality marker or grouping separators.
///
/// - `">100"` and `"50>"` parse as `100` and `50`
/// - `"50,000"` and `"1 250.50"` drop their separators
/// - `"ЕСТЬ"` (in stock) parses as `1`
///
/// # Errors
///
/// Returns `ArmtekError::ResponseFormat` for non-empty unparsable input when
/// `strict` is set. Lenient callers get `Ok(None)` instead.
pub fn parse_decimal(value: Option<&Value>, strict: bool) -> Result<Option<Decimal>, ArmtekError> {
    let Some(value) = value else {
        return Ok(None);
    };

    let parsed = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            decimal_from_text(trimmed)
        }
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    };

    match parsed {
        Some(d) => Ok(Some(d)),
        None if strict => Err(ArmtekError::ResponseFormat(format!(
            "invalid decimal value: {value}"
        ))),
        None => Ok(None),
    }
}

fn decimal_from_text(text: &str) -> Option<Decimal> {
    if text.to_lowercase() == IN_STOCK_TOKEN {
        return Some(Decimal::ONE);
    }

    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    let cleaned = cleaned
        .strip_prefix(['>', '<'])
        .unwrap_or(&cleaned)
        .trim_end_matches(['>', '<']);

    Decimal::from_str(cleaned).ok()
}

/// Parse an integer field, truncating any fractional part.
///
/// # Errors
///
/// Same contract as [`parse_decimal`]; a value outside the `i32` range is a
/// format error under `strict`.
pub fn parse_int(value: Option<&Value>, strict: bool) -> Result<Option<i32>, ArmtekError> {
    let Some(d) = parse_decimal(value, strict)? else {
        return Ok(None);
    };
    match d.trunc().to_i32() {
        Some(i) => Ok(Some(i)),
        None if strict => Err(ArmtekError::ResponseFormat(format!(
            "integer out of range: {d}"
        ))),
        None => Ok(None),
    }
}

// =============================================================================
// Flags
// =============================================================================

fn flag_token(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_lowercase()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Parse a truthy marker (`1`, `X`, `yes`, `true`, `default`, ...).
///
/// Anything unrecognized, including absence, is `false`.
#[must_use]
pub fn parse_bool_flag(value: Option<&Value>) -> bool {
    value
        .and_then(flag_token)
        .is_some_and(|token| TRUE_TOKENS.contains(&token.as_str()))
}

/// Parse the ANALOG column.
///
/// Absent or blank means "not an analog". A token that is neither truthy nor
/// falsy yields `None` so callers can tell it apart from an explicit `false`.
#[must_use]
pub fn parse_analog_flag(value: Option<&Value>) -> Option<bool> {
    let Some(value) = value else {
        return Some(false);
    };
    let Some(token) = flag_token(value) else {
        return matches!(value, Value::Null).then_some(false);
    };
    if token.is_empty() || FALSE_TOKENS.contains(&token.as_str()) {
        Some(false)
    } else if TRUE_TOKENS.contains(&token.as_str()) {
        Some(true)
    } else {
        None
    }
}

// =============================================================================
// Dates
// =============================================================================

/// Parse an Armtek timestamp.
///
/// Accepted forms, in order: `YYYYMMDDHHMMSS`, `YYYYMMDD`, `YYYY-MM-DD`,
/// `YYYY-MM-DDTHH:MM:SS`, then general ISO-8601 (RFC 3339, fractional
/// seconds, space separator). Dates without a time resolve to midnight.
///
/// # Errors
///
/// Returns `ArmtekError::ResponseFormat` when no form matches.
pub fn parse_datetime(text: &str) -> Result<Option<NaiveDateTime>, ArmtekError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    if text.chars().all(|c| c.is_ascii_digit()) {
        let parsed = match text.len() {
            14 => NaiveDateTime::parse_from_str(text, "%Y%m%d%H%M%S").ok(),
            8 => NaiveDate::parse_from_str(text, "%Y%m%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
            _ => None,
        };
        return parsed
            .map(Some)
            .ok_or_else(|| ArmtekError::ResponseFormat(format!("invalid date: {text}")));
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(Some(dt));
        }
    }

    DateTime::parse_from_rfc3339(text)
        .map(|dt| Some(dt.naive_utc()))
        .map_err(|_| ArmtekError::ResponseFormat(format!("invalid date: {text}")))
}

// =============================================================================
// Physical units
// =============================================================================

/// First `<number> <unit>` match, scaled by the factor of its unit.
///
/// `factor` receives the matched unit word.
fn scaled(text: &str, pattern: &Regex, factor: impl Fn(&str) -> i64) -> Option<i64> {
    let normalized = text.trim().to_lowercase().replace(',', ".");
    let captures = pattern.captures(&normalized)?;
    let number = Decimal::from_str(captures.get(1)?.as_str()).ok()?;
    let factor = factor(captures.get(2)?.as_str());
    (number * Decimal::from(factor)).round().to_i64()
}

/// Parse a free-text weight (`"0,56 кг"`, `"120 g"`) into whole grams.
///
/// The unit must directly follow the number as a whole word, so `"500 mg"`
/// and `"weight 500"` yield `None`.
#[must_use]
pub fn parse_weight_grams(text: &str) -> Option<i64> {
    scaled(text, &WEIGHT_RE, |unit| {
        if unit.starts_with(['к', 'k']) { 1000 } else { 1 }
    })
}

/// Parse a free-text length (`"12 см"`, `"85mm"`) into whole millimetres.
///
/// Returns `None` when there is no number followed by a recognizable unit.
#[must_use]
pub fn parse_length_mm(text: &str) -> Option<i64> {
    scaled(text, &LENGTH_RE, |unit| {
        if unit.starts_with(['м', 'm']) { 1 } else { 10 }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn dec_of(v: Value) -> Option<Decimal> {
        parse_decimal(Some(&v), false).unwrap()
    }

    #[test]
    fn test_parse_decimal_inequality_markers() {
        assert_eq!(dec_of(json!(">100")), Some(d("100")));
        assert_eq!(dec_of(json!("<5")), Some(d("5")));
        assert_eq!(dec_of(json!("50>")), Some(d("50")));
    }

    #[test]
    fn test_parse_decimal_grouping_separators() {
        assert_eq!(dec_of(json!(">50,000")), Some(d("50000")));
        assert_eq!(dec_of(json!("1 250.50")), Some(d("1250.50")));
        assert_eq!(dec_of(json!("1\u{a0}000")), Some(d("1000")));
    }

    #[test]
    fn test_parse_decimal_in_stock_token() {
        assert_eq!(dec_of(json!("ЕСТЬ")), Some(Decimal::ONE));
        assert_eq!(dec_of(json!("есть")), Some(Decimal::ONE));
    }

    #[test]
    fn test_parse_decimal_numbers_and_empty() {
        assert_eq!(dec_of(json!(12.5)), Some(d("12.5")));
        assert_eq!(dec_of(json!(7)), Some(d("7")));
        assert_eq!(dec_of(json!("")), None);
        assert_eq!(dec_of(Value::Null), None);
        assert_eq!(parse_decimal(None, true).unwrap(), None);
    }

    #[test]
    fn test_parse_decimal_garbage_strict_vs_lenient() {
        assert_eq!(dec_of(json!("abc")), None);
        let err = parse_decimal(Some(&json!("abc")), true).unwrap_err();
        assert!(matches!(err, ArmtekError::ResponseFormat(_)));
    }

    #[test]
    fn test_parse_int_truncates() {
        assert_eq!(parse_int(Some(&json!("14.9")), false).unwrap(), Some(14));
        assert_eq!(parse_int(Some(&json!(">10")), false).unwrap(), Some(10));
    }

    #[test]
    fn test_parse_bool_flag() {
        for truthy in ["1", "X", "x", "yes", "Y", "true", "on", "t", "DEFAULT"] {
            assert!(parse_bool_flag(Some(&json!(truthy))), "{truthy}");
        }
        for falsy in ["0", "", "no", "false", "maybe"] {
            assert!(!parse_bool_flag(Some(&json!(falsy))), "{falsy}");
        }
        assert!(parse_bool_flag(Some(&json!(true))));
        assert!(parse_bool_flag(Some(&json!(1))));
        assert!(!parse_bool_flag(None));
    }

    #[test]
    fn test_parse_analog_flag_tristate() {
        assert_eq!(parse_analog_flag(None), Some(false));
        assert_eq!(parse_analog_flag(Some(&Value::Null)), Some(false));
        assert_eq!(parse_analog_flag(Some(&json!(""))), Some(false));
        assert_eq!(parse_analog_flag(Some(&json!("0"))), Some(false));
        assert_eq!(parse_analog_flag(Some(&json!("X"))), Some(true));
        assert_eq!(parse_analog_flag(Some(&json!(1))), Some(true));
        assert_eq!(parse_analog_flag(Some(&json!("?"))), None);
    }

    #[test]
    fn test_parse_datetime_compact_forms() {
        let dt = parse_datetime("20240115093000").unwrap().unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 09:30:00");

        let d = parse_datetime("20240115").unwrap().unwrap();
        assert_eq!(d.to_string(), "2024-01-15 00:00:00");
    }

    #[test]
    fn test_parse_datetime_iso_forms() {
        assert_eq!(
            parse_datetime("2024-01-15").unwrap().unwrap().to_string(),
            "2024-01-15 00:00:00"
        );
        assert_eq!(
            parse_datetime("2024-01-15T10:20:30").unwrap().unwrap().to_string(),
            "2024-01-15 10:20:30"
        );
        assert_eq!(
            parse_datetime("2024-01-15T10:20:30+03:00")
                .unwrap()
                .unwrap()
                .to_string(),
            "2024-01-15 07:20:30"
        );
    }

    #[test]
    fn test_parse_datetime_failure_and_empty() {
        assert!(parse_datetime("").unwrap().is_none());
        assert!(parse_datetime("15.01.2024").is_err());
        assert!(parse_datetime("2024011").is_err());
    }

    #[test]
    fn test_parse_weight_grams() {
        assert_eq!(parse_weight_grams("0,56 кг"), Some(560));
        assert_eq!(parse_weight_grams("1.2 kg"), Some(1200));
        assert_eq!(parse_weight_grams("2 kilograms"), Some(2000));
        assert_eq!(parse_weight_grams("120 г"), Some(120));
        assert_eq!(parse_weight_grams("85 grams"), Some(85));
        assert_eq!(parse_weight_grams("560"), None);
        assert_eq!(parse_weight_grams("кг"), None);
    }

    #[test]
    fn test_parse_weight_requires_unit_word() {
        assert_eq!(parse_weight_grams("56 кг"), Some(56000));
        assert_eq!(parse_weight_grams("56kg"), Some(56000));
        assert_eq!(parse_weight_grams("вес 350 гр"), Some(350));
        assert_eq!(parse_weight_grams("weight 500"), None);
        assert_eq!(parse_weight_grams("500 mg"), None);
        assert_eq!(parse_weight_grams("500 gallons"), None);
    }

    #[test]
    fn test_parse_length_mm() {
        assert_eq!(parse_length_mm("12 см"), Some(120));
        assert_eq!(parse_length_mm("4,5 cm"), Some(45));
        assert_eq!(parse_length_mm("85 мм"), Some(85));
        assert_eq!(parse_length_mm("85mm"), Some(85));
        assert_eq!(parse_length_mm("85"), None);
    }

    #[test]
    fn test_parse_length_requires_unit_word() {
        assert_eq!(parse_length_mm("5,5 см"), Some(55));
        assert_eq!(parse_length_mm("2 x 85 mm"), Some(85));
        assert_eq!(parse_length_mm("12 сантиметров"), Some(120));
        assert_eq!(parse_length_mm("12 cmx"), None);
        assert_eq!(parse_length_mm("length 40"), None);
    }

    #[test]
    fn test_first_value_skips_blank_aliases() {
        let row = json!({"VENSEL": "", "VENSL": "0.95"});
        let map = row.as_object().unwrap();
        assert_eq!(first_text(map, &["VENSEL", "VENSL"]).as_deref(), Some("0.95"));
        assert!(require_text(map, &["MISSING"], "MISSING").is_err());
    }
}
