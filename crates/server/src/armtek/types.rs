//! Armtek domain types.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::ArmtekError;
use super::parsing::parse_datetime;

/// Program label Armtek sometimes returns instead of a real program code.
/// Sending it back filters results down to nothing.
const PLACEHOLDER_PROGRAM: &str = "russia";

// =============================================================================
// Search context and credentials
// =============================================================================

/// Customer context required by the search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchContext {
    /// Sales organization.
    pub vkorg: String,
    /// Payer (customer) code.
    pub kunnr_rg: String,
    /// Price program.
    pub program: Option<String>,
    /// Delivery address code.
    pub kunnr_za: Option<String>,
    /// Delivery terms.
    pub incoterms: Option<i32>,
    /// Contract number.
    pub vbeln: Option<String>,
}

impl SearchContext {
    /// Build a context from the two required fields.
    #[must_use]
    pub fn new(vkorg: impl Into<String>, kunnr_rg: impl Into<String>) -> Self {
        Self {
            vkorg: vkorg.into(),
            kunnr_rg: kunnr_rg.into(),
            program: None,
            kunnr_za: None,
            incoterms: None,
            vbeln: None,
        }
    }

    /// Trim every field, drop blank optionals, and discard the placeholder program.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            vkorg: self.vkorg.trim().to_string(),
            kunnr_rg: self.kunnr_rg.trim().to_string(),
            program: normalize_program(self.program.as_deref()),
            kunnr_za: non_blank(self.kunnr_za.as_deref()),
            incoterms: self.incoterms,
            vbeln: non_blank(self.vbeln.as_deref()),
        }
    }

    /// Check that both required fields are present.
    ///
    /// # Errors
    ///
    /// Returns `ArmtekError::Credentials` naming the missing field.
    pub fn validate(&self) -> Result<(), ArmtekError> {
        if self.vkorg.trim().is_empty() {
            return Err(ArmtekError::Credentials("Armtek VKORG is required".to_string()));
        }
        if self.kunnr_rg.trim().is_empty() {
            return Err(ArmtekError::Credentials("Armtek KUNNR_RG is required".to_string()));
        }
        Ok(())
    }
}

/// A context where every field may be missing.
///
/// Used for stored per-user overrides and for configured defaults, which are
/// merged field by field before a search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialContext {
    pub vkorg: Option<String>,
    pub kunnr_rg: Option<String>,
    pub program: Option<String>,
    pub kunnr_za: Option<String>,
    pub incoterms: Option<i32>,
    pub vbeln: Option<String>,
}

impl PartialContext {
    /// Fill every missing field from `fallback`.
    #[must_use]
    pub fn or(self, fallback: &Self) -> Self {
        Self {
            vkorg: non_blank(self.vkorg.as_deref()).or_else(|| fallback.vkorg.clone()),
            kunnr_rg: non_blank(self.kunnr_rg.as_deref()).or_else(|| fallback.kunnr_rg.clone()),
            program: non_blank(self.program.as_deref()).or_else(|| fallback.program.clone()),
            kunnr_za: non_blank(self.kunnr_za.as_deref()).or_else(|| fallback.kunnr_za.clone()),
            incoterms: self.incoterms.or(fallback.incoterms),
            vbeln: non_blank(self.vbeln.as_deref()).or_else(|| fallback.vbeln.clone()),
        }
    }

    /// Convert into a full context.
    ///
    /// # Errors
    ///
    /// Returns `ArmtekError::Credentials` if `vkorg` or `kunnr_rg` is missing.
    pub fn into_search_context(self) -> Result<SearchContext, ArmtekError> {
        let context = SearchContext {
            vkorg: self.vkorg.unwrap_or_default(),
            kunnr_rg: self.kunnr_rg.unwrap_or_default(),
            program: self.program,
            kunnr_za: self.kunnr_za,
            incoterms: self.incoterms,
            vbeln: self.vbeln,
        }
        .normalized();
        context.validate()?;
        Ok(context)
    }
}

impl From<SearchContext> for PartialContext {
    fn from(context: SearchContext) -> Self {
        Self {
            vkorg: Some(context.vkorg),
            kunnr_rg: Some(context.kunnr_rg),
            program: context.program,
            kunnr_za: context.kunnr_za,
            incoterms: context.incoterms,
            vbeln: context.vbeln,
        }
    }
}

/// Armtek login with its (possibly partial) customer context.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct Credentials {
    pub login: String,
    pub password: SecretString,
    pub context: PartialContext,
}

impl Credentials {
    /// Build credentials, rejecting a blank login or password.
    #[must_use]
    pub fn new(login: &str, password: SecretString, context: PartialContext) -> Option<Self> {
        let login = login.trim();
        if login.is_empty() || password.expose_secret().is_empty() {
            return None;
        }
        Some(Self {
            login: login.to_string(),
            password,
            context,
        })
    }

    /// Full search context for these credentials.
    ///
    /// # Errors
    ///
    /// Returns `ArmtekError::Credentials` if `vkorg` or `kunnr_rg` is missing.
    pub fn search_context(&self) -> Result<SearchContext, ArmtekError> {
        self.context.clone().into_search_context()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .field("context", &self.context)
            .finish()
    }
}

// =============================================================================
// Search results
// =============================================================================

/// One catalog offer returned by the search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    pub artid: String,
    pub pin: String,
    pub brand: String,
    pub name: String,
    /// `Some(true)` for analogs, `None` when the flag was unreadable.
    pub is_analog: Option<bool>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub quantity_available: Option<Decimal>,
    pub warehouse_partner: Option<String>,
    pub warehouse_code: Option<String>,
    pub return_days: Option<i32>,
    pub multiplicity: Option<i32>,
    pub minimum_order: Option<i32>,
    pub supply_probability: Option<Decimal>,
    pub delivery_date: Option<String>,
    pub warranty_date: Option<String>,
    pub import_flag: Option<String>,
    pub special_flag: Option<String>,
    pub max_retail_price: Option<Decimal>,
    pub markup: Option<Decimal>,
    pub note: Option<String>,
    pub importer_markup: Option<Decimal>,
    pub producer_price: Option<Decimal>,
    pub markup_rest_rub: Option<Decimal>,
    pub markup_rest_percent: Option<Decimal>,
    /// The row exactly as received.
    pub raw: serde_json::Value,
}

impl SearchItem {
    /// Parsed `delivery_date`; unreadable dates yield `None`.
    #[must_use]
    pub fn delivery_at(&self) -> Option<NaiveDateTime> {
        self.delivery_date
            .as_deref()
            .and_then(|d| parse_datetime(d).ok().flatten())
    }

    /// Parsed `warranty_date`; unreadable dates yield `None`.
    #[must_use]
    pub fn warranty_until(&self) -> Option<NaiveDateTime> {
        self.warranty_date
            .as_deref()
            .and_then(|d| parse_datetime(d).ok().flatten())
    }
}

/// An analog reference stored alongside a product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AltArticle {
    pub pin: String,
    pub brand: String,
}

impl From<&SearchItem> for AltArticle {
    fn from(item: &SearchItem) -> Self {
        Self {
            pin: item.pin.clone(),
            brand: item.brand.clone(),
        }
    }
}

// =============================================================================
// Profile
// =============================================================================

/// Sales organization available to a login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VkorgEntry {
    pub vkorg: String,
    pub program_name: Option<String>,
    pub is_default: bool,
}

/// Buyer, delivery address, or pickup point from the client structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureEntry {
    pub id: Option<String>,
    pub name: Option<String>,
    pub is_default: bool,
    pub raw: serde_json::Value,
}

/// Contract from the client structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// `VBELN` used in search requests.
    pub id: Option<String>,
    pub number: Option<String>,
    pub date: Option<String>,
    pub valid_to: Option<String>,
    pub currency: Option<String>,
    pub is_default: bool,
    pub raw: serde_json::Value,
}

/// Customer structure behind a sales organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientStructure {
    pub kunag: Option<String>,
    pub vkorg: Option<String>,
    pub short_name: Option<String>,
    pub full_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    /// `RG_TAB`
    pub buyers: Vec<StructureEntry>,
    /// `ZA_TAB`
    pub delivery_addresses: Vec<StructureEntry>,
    /// `EXW_TAB`
    pub pickup_points: Vec<StructureEntry>,
    /// `DOGOVOR_TAB`
    pub contracts: Vec<Contract>,
}

/// Anything that can carry a "default" marker.
pub trait DefaultMarked {
    fn is_default(&self) -> bool;
}

impl DefaultMarked for VkorgEntry {
    fn is_default(&self) -> bool {
        self.is_default
    }
}

impl DefaultMarked for StructureEntry {
    fn is_default(&self) -> bool {
        self.is_default
    }
}

impl DefaultMarked for Contract {
    fn is_default(&self) -> bool {
        self.is_default
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Trim a program code and drop blanks and the placeholder label.
#[must_use]
pub fn normalize_program(program: Option<&str>) -> Option<String> {
    non_blank(program).filter(|p| !p.eq_ignore_ascii_case(PLACEHOLDER_PROGRAM))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_program_placeholder_is_dropped() {
        assert_eq!(normalize_program(Some("Russia")), None);
        assert_eq!(normalize_program(Some(" RUSSIA ")), None);
        assert_eq!(normalize_program(Some("  ")), None);
        assert_eq!(normalize_program(Some("LP")).as_deref(), Some("LP"));
    }

    #[test]
    fn test_context_validate_requires_vkorg_and_kunnr_rg() {
        assert!(SearchContext::new("4000", "43232305").validate().is_ok());
        assert!(matches!(
            SearchContext::new("", "43232305").validate(),
            Err(ArmtekError::Credentials(_))
        ));
        assert!(matches!(
            SearchContext::new("4000", " ").validate(),
            Err(ArmtekError::Credentials(_))
        ));
    }

    #[test]
    fn test_partial_context_merge_prefers_own_values() {
        let own = PartialContext {
            vkorg: Some("5000".to_string()),
            kunnr_za: Some(String::new()),
            ..Default::default()
        };
        let defaults = PartialContext {
            vkorg: Some("4000".to_string()),
            kunnr_rg: Some("100".to_string()),
            kunnr_za: Some("200".to_string()),
            incoterms: Some(1),
            ..Default::default()
        };

        let merged = own.or(&defaults);
        assert_eq!(merged.vkorg.as_deref(), Some("5000"));
        assert_eq!(merged.kunnr_rg.as_deref(), Some("100"));
        assert_eq!(merged.kunnr_za.as_deref(), Some("200"));
        assert_eq!(merged.incoterms, Some(1));
    }

    #[test]
    fn test_into_search_context_normalizes() {
        let context = PartialContext {
            vkorg: Some(" 4000 ".to_string()),
            kunnr_rg: Some("100".to_string()),
            program: Some("Russia".to_string()),
            vbeln: Some(String::new()),
            ..Default::default()
        }
        .into_search_context()
        .unwrap();

        assert_eq!(context.vkorg, "4000");
        assert_eq!(context.program, None);
        assert_eq!(context.vbeln, None);

        assert!(PartialContext::default().into_search_context().is_err());
    }

    #[test]
    fn test_credentials_reject_blank_and_redact() {
        assert!(Credentials::new("", SecretString::from("pw"), PartialContext::default()).is_none());
        assert!(Credentials::new("user", SecretString::from(""), PartialContext::default()).is_none());

        let creds =
            Credentials::new("user", SecretString::from("hunter2"), PartialContext::default())
                .unwrap();
        let debug = format!("{creds:?}");
        assert!(debug.contains("user"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }
}
