//! Interpretation of user-typed search queries.

use crate::error::AppError;

/// An article number with an optional brand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub pin: String,
    pub brand: Option<String>,
}

/// Split `PIN_BRAND`, `PIN BRAND` or a bare `PIN`.
///
/// The underscore wins over whitespace, and only the first separator splits,
/// so `"OC 90_MAHLE"` is pin `OC 90` with brand `MAHLE`.
///
/// # Errors
///
/// Returns `AppError::BadQuery` when no article number remains.
pub fn split_pin_and_brand(query: &str) -> Result<ParsedQuery, AppError> {
    let text = query.trim();
    if text.is_empty() {
        return Err(AppError::BadQuery("enter an article number".to_string()));
    }

    let (pin, brand) = text
        .split_once('_')
        .or_else(|| text.split_once(char::is_whitespace))
        .map_or((text, None), |(pin, brand)| (pin, Some(brand)));

    let pin = pin.trim();
    if pin.is_empty() {
        return Err(AppError::BadQuery(format!("no article number in {text:?}")));
    }

    Ok(ParsedQuery {
        pin: pin.to_string(),
        brand: brand
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(ToString::to_string),
    })
}

/// Split a pasted block of queries on newlines, commas and semicolons.
///
/// Periods, slashes and hyphens belong to article numbers and never split.
/// Blank entries are dropped.
#[must_use]
pub fn split_bulk_input(raw: &str) -> Vec<String> {
    raw.split(['\r', '\n', ',', ';'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(ToString::to_string)
        .collect()
}
