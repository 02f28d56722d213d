//! Armtek user profile: sales organizations and client structure.
//!
//! Used to auto-discover the [`SearchContext`] for a login so users only
//! have to enter a login and password.

use std::time::Duration;

use moka::future::Cache;
use serde_json::{Map, Value};
use tracing::instrument;

use super::client::{ArmtekTransport, USER_INFO_PATH, VKORG_LIST_PATH};
use super::envelope::{extract_array, extract_structure, unwrap_envelope};
use super::parsing::{first_text, first_value, parse_bool_flag};
use super::types::normalize_program;
use super::{
    ArmtekError, ClientStructure, Contract, DefaultMarked, SearchContext, StructureEntry,
    VkorgEntry,
};

const DEFAULT_MARKERS: &[&str] = &["DEFAULT", "IS_DEFAULT", "DEF"];
const BUYER_ID: &[&str] = &["ID", "KUNRG", "KUNNR"];
const DELIVERY_ID: &[&str] = &["ID", "KUNWE", "KUNNR"];
const PICKUP_ID: &[&str] = &["ID", "EXW_ID", "POINT_ID"];
const ENTRY_NAME: &[&str] = &["NAME1", "NAME", "SNAME", "ADDRESS"];

const STRUCTURE_CACHE_CAPACITY: u64 = 64;
const STRUCTURE_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// Profile lookups with a per-instance client-structure cache.
pub struct ProfileService<'a, T: ArmtekTransport + ?Sized> {
    transport: &'a T,
    structures: Cache<String, ClientStructure>,
}

impl<'a, T: ArmtekTransport + ?Sized> ProfileService<'a, T> {
    #[must_use]
    pub fn new(transport: &'a T) -> Self {
        let structures = Cache::builder()
            .max_capacity(STRUCTURE_CACHE_CAPACITY)
            .time_to_live(STRUCTURE_CACHE_TTL)
            .build();
        Self {
            transport,
            structures,
        }
    }

    /// Sales organizations available to the login.
    ///
    /// # Errors
    ///
    /// Returns any transport or envelope error.
    #[instrument(skip(self))]
    pub async fn get_vkorg_list(&self) -> Result<Vec<VkorgEntry>, ArmtekError> {
        let raw = self.transport.get(VKORG_LIST_PATH, &[]).await?;
        let resp = unwrap_envelope(raw)?;
        Ok(extract_array(&resp, "ARRAY")?
            .iter()
            .filter_map(Value::as_object)
            .filter_map(parse_vkorg)
            .collect())
    }

    /// Client structure for `vkorg`.
    ///
    /// With `use_cache`, a structure fetched earlier by this instance is
    /// returned without a request; without it the upstream is always queried
    /// and the cache refreshed.
    ///
    /// # Errors
    ///
    /// Returns any transport or envelope error, or `ArmtekError::ResponseFormat`
    /// when `RESP.STRUCTURE` is unusable.
    #[instrument(skip(self))]
    pub async fn get_client_structure(
        &self,
        vkorg: &str,
        use_cache: bool,
    ) -> Result<ClientStructure, ArmtekError> {
        if use_cache && let Some(cached) = self.structures.get(vkorg).await {
            tracing::debug!("Client structure cache hit");
            return Ok(cached);
        }

        let form = [("VKORG", vkorg.to_string()), ("STRUCTURE", "1".to_string())];
        let raw = self.transport.post_form(USER_INFO_PATH, &form).await?;
        let resp = unwrap_envelope(raw)?;
        let structure = parse_structure(extract_structure(&resp)?);

        self.structures
            .insert(vkorg.to_string(), structure.clone())
            .await;
        Ok(structure)
    }

    /// Derive a complete search context from the profile.
    ///
    /// Takes the default sales organization, then the default buyer,
    /// delivery address and contract of its client structure.
    ///
    /// # Errors
    ///
    /// Returns `ArmtekError::Credentials` when the profile has no sales
    /// organization or no payer, plus any lookup error.
    #[instrument(skip(self))]
    pub async fn discover_context(&self) -> Result<SearchContext, ArmtekError> {
        let vkorgs = self.get_vkorg_list().await?;
        let vkorg = pick_default(&vkorgs).ok_or_else(|| {
            ArmtekError::Credentials("Armtek profile has no sales organizations".to_string())
        })?;

        let structure = self.get_client_structure(&vkorg.vkorg, true).await?;
        let kunnr_rg = pick_default(&structure.buyers)
            .and_then(|buyer| buyer.id.clone())
            .or_else(|| structure.kunag.clone())
            .ok_or_else(|| {
                ArmtekError::Credentials("Armtek profile has no payer (KUNNR_RG)".to_string())
            })?;

        let context = SearchContext {
            vkorg: vkorg.vkorg.clone(),
            kunnr_rg,
            program: normalize_program(vkorg.program_name.as_deref()),
            kunnr_za: pick_default(&structure.delivery_addresses).and_then(|za| za.id.clone()),
            incoterms: None,
            vbeln: pick_default(&structure.contracts).and_then(|c| c.id.clone()),
        }
        .normalized();

        tracing::info!(vkorg = %context.vkorg, "Discovered Armtek search context");
        Ok(context)
    }
}

/// The entry flagged as default, else the first one.
#[must_use]
pub fn pick_default<T: DefaultMarked>(entries: &[T]) -> Option<&T> {
    entries
        .iter()
        .find(|entry| entry.is_default())
        .or_else(|| entries.first())
}

fn is_default(map: &Map<String, Value>) -> bool {
    parse_bool_flag(first_value(map, DEFAULT_MARKERS))
}

fn parse_vkorg(map: &Map<String, Value>) -> Option<VkorgEntry> {
    Some(VkorgEntry {
        vkorg: first_text(map, &["VKORG"])?,
        program_name: first_text(map, &["PROGRAM_NAME", "PROGRAM"]),
        is_default: is_default(map),
    })
}

/// Rows of a sub-table; a lone mapping counts as a one-row table.
fn table<'a>(structure: &'a Map<String, Value>, name: &str) -> Vec<&'a Map<String, Value>> {
    match structure.get(name) {
        Some(Value::Array(rows)) => rows.iter().filter_map(Value::as_object).collect(),
        Some(Value::Object(row)) => vec![row],
        _ => Vec::new(),
    }
}

fn entries(structure: &Map<String, Value>, name: &str, id_aliases: &[&str]) -> Vec<StructureEntry> {
    table(structure, name)
        .into_iter()
        .map(|row| StructureEntry {
            id: first_text(row, id_aliases),
            name: first_text(row, ENTRY_NAME),
            is_default: is_default(row),
            raw: Value::Object(row.clone()),
        })
        .collect()
}

fn contracts(structure: &Map<String, Value>) -> Vec<Contract> {
    table(structure, "DOGOVOR_TAB")
        .into_iter()
        .map(|row| Contract {
            id: first_text(row, &["VBELN"]),
            number: first_text(row, &["DOCNUM", "NUMBER", "DOC_NUMBER"]),
            date: first_text(row, &["DATE", "DATUM", "ERDAT"]),
            valid_to: first_text(row, &["VALID_TO", "VALDT", "GUELTIGBIS"]),
            currency: first_text(row, &["WAERS", "CURRENCY"]),
            is_default: is_default(row),
            raw: Value::Object(row.clone()),
        })
        .collect()
}

/// Map `RESP.STRUCTURE` to a [`ClientStructure`].
#[must_use]
pub fn parse_structure(structure: &Map<String, Value>) -> ClientStructure {
    ClientStructure {
        kunag: first_text(structure, &["KUNAG"]),
        vkorg: first_text(structure, &["VKORG"]),
        short_name: first_text(structure, &["SORTL", "SHORT_NAME"]),
        full_name: first_text(structure, &["NAME1", "FULL_NAME", "NAME"]),
        address: first_text(structure, &["ADDRESS", "ADRESS", "STREET"]),
        phone: first_text(structure, &["PHONE", "TEL_NUMBER", "TELF1"]),
        buyers: entries(structure, "RG_TAB", BUYER_ID),
        delivery_addresses: entries(structure, "ZA_TAB", DELIVERY_ID),
        pickup_points: entries(structure, "EXW_TAB", PICKUP_ID),
        contracts: contracts(structure),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::armtek::testing::ScriptedTransport;
    use serde_json::json;

    fn vkorg_list() -> Value {
        json!({
            "STATUS": 200,
            "MESSAGES": [],
            "RESP": [
                {"VKORG": "4000", "PROGRAM_NAME": "Russia"},
                {"VKORG": "5000", "PROGRAM_NAME": "LP", "DEFAULT": "X"}
            ]
        })
    }

    fn user_info() -> Value {
        json!({
            "STATUS": 200,
            "MESSAGES": [],
            "RESP": {
                "STRUCTURE": [{
                    "KUNAG": "100",
                    "VKORG": "5000",
                    "SORTL": "ACME",
                    "NAME1": "ACME Parts LLC",
                    "RG_TAB": [
                        {"KUNNR": "200", "NAME1": "Main payer"},
                        {"KUNRG": "201", "IS_DEFAULT": "1"}
                    ],
                    "ZA_TAB": [{"KUNWE": "300"}],
                    "EXW_TAB": {"EXW_ID": "400"},
                    "DOGOVOR_TAB": [
                        {"VBELN": "C1", "DOCNUM": "42/2024", "DATUM": "20240101", "WAERS": "RUB"}
                    ]
                }]
            }
        })
    }

    #[tokio::test]
    async fn test_get_vkorg_list() {
        let transport = ScriptedTransport::new([vkorg_list()]);
        let list = ProfileService::new(&transport).get_vkorg_list().await.unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].vkorg, "4000");
        assert!(!list[0].is_default);
        assert!(list[1].is_default);

        let calls = transport.calls();
        assert_eq!(calls[0].method, "GET");
        assert_eq!(calls[0].path, VKORG_LIST_PATH);
    }

    #[tokio::test]
    async fn test_get_client_structure_parses_tables() {
        let transport = ScriptedTransport::new([user_info()]);
        let structure = ProfileService::new(&transport)
            .get_client_structure("5000", true)
            .await
            .unwrap();

        assert_eq!(structure.kunag.as_deref(), Some("100"));
        assert_eq!(structure.short_name.as_deref(), Some("ACME"));
        assert_eq!(structure.full_name.as_deref(), Some("ACME Parts LLC"));
        assert_eq!(structure.buyers.len(), 2);
        assert_eq!(structure.buyers[0].id.as_deref(), Some("200"));
        assert_eq!(structure.delivery_addresses[0].id.as_deref(), Some("300"));
        assert_eq!(structure.pickup_points[0].id.as_deref(), Some("400"));
        let contract = &structure.contracts[0];
        assert_eq!(contract.id.as_deref(), Some("C1"));
        assert_eq!(contract.number.as_deref(), Some("42/2024"));
        assert_eq!(contract.date.as_deref(), Some("20240101"));
        assert_eq!(contract.currency.as_deref(), Some("RUB"));

        let calls = transport.calls();
        assert_eq!(calls[0].path, USER_INFO_PATH);
        assert_eq!(calls[0].param("VKORG"), Some("5000"));
        assert_eq!(calls[0].param("STRUCTURE"), Some("1"));
    }

    #[tokio::test]
    async fn test_client_structure_cache_and_bypass() {
        let transport = ScriptedTransport::new([user_info(), user_info()]);
        let service = ProfileService::new(&transport);

        service.get_client_structure("5000", true).await.unwrap();
        service.get_client_structure("5000", true).await.unwrap();
        assert_eq!(transport.calls().len(), 1);

        service.get_client_structure("5000", false).await.unwrap();
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_cache_is_per_instance() {
        let transport = ScriptedTransport::new([user_info(), user_info()]);
        ProfileService::new(&transport)
            .get_client_structure("5000", true)
            .await
            .unwrap();
        ProfileService::new(&transport)
            .get_client_structure("5000", true)
            .await
            .unwrap();
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_discover_context_uses_defaults() {
        let transport = ScriptedTransport::new([vkorg_list(), user_info()]);
        let context = ProfileService::new(&transport)
            .discover_context()
            .await
            .unwrap();

        assert_eq!(context.vkorg, "5000");
        assert_eq!(context.kunnr_rg, "201");
        assert_eq!(context.program.as_deref(), Some("LP"));
        assert_eq!(context.kunnr_za.as_deref(), Some("300"));
        assert_eq!(context.vbeln.as_deref(), Some("C1"));
    }

    #[tokio::test]
    async fn test_discover_context_without_vkorg() {
        let transport =
            ScriptedTransport::new([json!({"STATUS": 200, "MESSAGES": [], "RESP": []})]);
        let err = ProfileService::new(&transport)
            .discover_context()
            .await
            .unwrap_err();
        assert!(matches!(err, ArmtekError::Credentials(_)));
    }

    #[test]
    fn test_pick_default_prefers_flag_then_first() {
        let entry = |id: &str, is_default: bool| StructureEntry {
            id: Some(id.to_string()),
            name: None,
            is_default,
            raw: Value::Null,
        };

        let entries = vec![entry("a", false), entry("b", true)];
        assert_eq!(pick_default(&entries).unwrap().id.as_deref(), Some("b"));

        let entries = vec![entry("a", false), entry("b", false)];
        assert_eq!(pick_default(&entries).unwrap().id.as_deref(), Some("a"));

        assert!(pick_default::<StructureEntry>(&[]).is_none());
    }
}
