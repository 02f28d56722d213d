//! Part search.
//!
//! Wraps `POST /api/ws_search/search`: builds the form from a
//! [`SearchContext`], unwraps the envelope, and maps each row of
//! `RESP.ARRAY` to a [`SearchItem`].

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::instrument;

use super::client::{ArmtekTransport, SEARCH_PATH};
use super::envelope::{extract_array, unwrap_envelope};
use super::parsing::{
    first_text, first_value, parse_analog_flag, parse_datetime, parse_decimal, parse_int,
    require_text,
};
use super::{AltArticle, ArmtekError, SearchContext, SearchItem};

/// Columns a row must carry under [`RowParsing::Strict`].
const STRICT_REQUIRED: &[(&[&str], &str)] = &[
    (&["PIN"], "PIN"),
    (&["BRAND"], "BRAND"),
    (&["NAME"], "NAME"),
    (&["ARTID"], "ARTID"),
    (&["PARNR"], "PARNR"),
    (&["KEYZAK"], "KEYZAK"),
    (&["RVALUE"], "RVALUE"),
    (&["RETDAYS"], "RETDAYS"),
    (&["RDPRF"], "RDPRF"),
    (&["MINBM"], "MINBM"),
    (&["VENSL", "VENSEL"], "VENSL"),
    (&["PRICE"], "PRICE"),
    (&["WAERS"], "WAERS"),
];

/// How tolerant row parsing is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowParsing {
    /// Only `ARTID` is required. `PIN` and `BRAND` fall back to the query and
    /// unreadable values are dropped.
    #[default]
    BestEffort,
    /// The full documented column set is required and malformed numbers or
    /// dates fail the whole call.
    Strict,
}

/// Search operations over an Armtek transport.
pub struct SearchService<'a, T: ArmtekTransport + ?Sized> {
    transport: &'a T,
    row_parsing: RowParsing,
}

impl<'a, T: ArmtekTransport + ?Sized> SearchService<'a, T> {
    /// Create a search service with best-effort row parsing.
    #[must_use]
    pub const fn new(transport: &'a T) -> Self {
        Self {
            transport,
            row_parsing: RowParsing::BestEffort,
        }
    }

    /// Override the row parsing mode.
    #[must_use]
    pub const fn with_row_parsing(mut self, row_parsing: RowParsing) -> Self {
        self.row_parsing = row_parsing;
        self
    }

    /// Look up offers for an article number.
    ///
    /// `QUERY_TYPE` defaults to `1` (direct matches) when neither a brand nor
    /// an explicit query type is given.
    ///
    /// # Errors
    ///
    /// - `ArmtekError::Credentials` if the context lacks `VKORG` or `KUNNR_RG`
    ///   (no request is sent)
    /// - any transport or envelope error
    /// - `ArmtekError::ResponseFormat` for unparsable rows
    #[instrument(skip(self, context), fields(vkorg = %context.vkorg))]
    pub async fn search(
        &self,
        context: &SearchContext,
        pin: &str,
        brand: Option<&str>,
        query_type: Option<i32>,
    ) -> Result<Vec<SearchItem>, ArmtekError> {
        context.validate()?;

        let pin = pin.trim();
        let brand = brand.map(str::trim).filter(|b| !b.is_empty());
        let form = build_search_form(&context.clone().normalized(), pin, brand, query_type);

        let raw = self.transport.post_form(SEARCH_PATH, &form).await?;
        let resp = unwrap_envelope(raw)?;
        let rows = extract_array(&resp, "ARRAY")?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(row) = row.as_object() else {
                if self.row_parsing == RowParsing::Strict {
                    return Err(ArmtekError::ResponseFormat(
                        "search row is not a mapping".to_string(),
                    ));
                }
                tracing::warn!("Skipping non-mapping search row");
                continue;
            };
            items.push(parse_row(row, pin, brand, self.row_parsing)?);
        }

        tracing::debug!(count = items.len(), "Armtek search returned rows");
        Ok(items)
    }
}

/// Assemble the search form. Optional fields are only sent when set.
fn build_search_form(
    context: &SearchContext,
    pin: &str,
    brand: Option<&str>,
    query_type: Option<i32>,
) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("VKORG", context.vkorg.clone()),
        ("KUNNR_RG", context.kunnr_rg.clone()),
        ("PIN", pin.to_string()),
    ];

    if let Some(brand) = brand {
        form.push(("BRAND", brand.to_string()));
    }
    match (query_type, brand) {
        (Some(query_type), _) => form.push(("QUERY_TYPE", query_type.to_string())),
        (None, None) => form.push(("QUERY_TYPE", "1".to_string())),
        (None, Some(_)) => {}
    }
    if let Some(program) = &context.program {
        form.push(("PROGRAM", program.clone()));
    }
    if let Some(kunnr_za) = &context.kunnr_za {
        form.push(("KUNNR_ZA", kunnr_za.clone()));
    }
    if let Some(incoterms) = context.incoterms {
        form.push(("INCOTERMS", incoterms.to_string()));
    }
    if let Some(vbeln) = &context.vbeln {
        form.push(("VBELN", vbeln.clone()));
    }

    form
}

/// Map one `RESP.ARRAY` row to a [`SearchItem`].
///
/// # Errors
///
/// Returns `ArmtekError::ResponseFormat` when a required column is missing
/// or, under [`RowParsing::Strict`], a value is malformed.
pub fn parse_row(
    row: &Map<String, Value>,
    query_pin: &str,
    query_brand: Option<&str>,
    mode: RowParsing,
) -> Result<SearchItem, ArmtekError> {
    let strict = mode == RowParsing::Strict;
    if strict {
        for (aliases, field) in STRICT_REQUIRED {
            require_text(row, aliases, field)?;
        }
    }

    let artid = require_text(row, &["ARTID"], "ARTID")?;
    let text = |aliases: &[&str]| first_text(row, aliases);
    let decimal = |name: &str| parse_decimal(row.get(name), strict);
    let int = |name: &str| parse_int(row.get(name), strict);
    let date = |name: &str| -> Result<Option<String>, ArmtekError> {
        let value = first_text(row, &[name]);
        if strict && let Some(v) = &value {
            parse_datetime(v)?;
        }
        Ok(value)
    };

    Ok(SearchItem {
        pin: text(&["PIN"]).unwrap_or_else(|| query_pin.to_string()),
        brand: text(&["BRAND"])
            .or_else(|| query_brand.map(String::from))
            .unwrap_or_default(),
        name: text(&["NAME"]).unwrap_or_default(),
        is_analog: parse_analog_flag(row.get("ANALOG")),
        price: decimal("PRICE")?,
        currency: text(&["WAERS"]),
        quantity_available: decimal("RVALUE")?,
        warehouse_partner: text(&["PARNR"]),
        warehouse_code: text(&["KEYZAK"]),
        return_days: int("RETDAYS")?,
        multiplicity: int("RDPRF")?,
        minimum_order: int("MINBM")?,
        supply_probability: parse_decimal(first_value(row, &["VENSL", "VENSEL"]), strict)?,
        delivery_date: date("DLVDT")?,
        warranty_date: date("WRNTDT")?,
        import_flag: text(&["TYPEB"]),
        special_flag: text(&["DSPEC"]),
        max_retail_price: decimal("RCOST")?,
        markup: decimal("MRKBY")?,
        note: text(&["PNOTE"]),
        importer_markup: decimal("IMP_ADD")?,
        producer_price: decimal("SELLP")?,
        markup_rest_rub: decimal("REST_ADD")?,
        markup_rest_percent: decimal("REST_ADD_P")?,
        raw: Value::Object(row.clone()),
        artid,
    })
}

/// The first offer that is not flagged as an analog.
///
/// Offers with an unreadable analog flag count as non-analogs. Returns
/// `None` when the list is empty or every offer is an analog.
#[must_use]
pub fn choose_first_non_analog(items: &[SearchItem]) -> Option<&SearchItem> {
    items.iter().find(|item| item.is_analog != Some(true))
}

/// Analogs of `main` as `(pin, brand)` pairs, deduplicated, in result order.
#[must_use]
pub fn alternates_for(main: &SearchItem, items: &[SearchItem]) -> Vec<AltArticle> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| item.is_analog == Some(true) && item.artid != main.artid)
        .map(AltArticle::from)
        .filter(|alt| seen.insert(alt.clone()))
        .collect()
}
