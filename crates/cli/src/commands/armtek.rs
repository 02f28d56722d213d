//! Armtek diagnostics.
//!
//! These commands use the global default account (`ARMTEK_LOGIN`,
//! `ARMTEK_PASSWORD`, `ARMTEK_VKORG`, ...). With `ARMTEK_ENABLE_STUB` set
//! they run against the offline stub, with placeholder credentials if none
//! are configured.

use elizabeth_server::armtek::connector::stub_credentials;
use elizabeth_server::armtek::{
    ArmtekConnector, ArmtekError, Credentials, HttpConnector, ProfileService, SearchService,
    alternates_for, choose_first_non_analog, tokens,
};
use elizabeth_server::config::{ArmtekConfig, ConfigError};
use elizabeth_server::services::query::split_pin_and_brand;
use serde_json::json;
use thiserror::Error;

use super::print_json;

/// Errors from the Armtek commands.
#[derive(Debug, Error)]
pub enum ArmtekCommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No Armtek account configured (set ARMTEK_LOGIN and ARMTEK_PASSWORD)")]
    NoAccount,

    #[error(transparent)]
    Armtek(#[from] ArmtekError),

    #[error("Invalid query: {0}")]
    Query(String),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

fn load() -> Result<(ArmtekConfig, Credentials, HttpConnector), ArmtekCommandError> {
    let config = ArmtekConfig::from_env()?;
    let connector = HttpConnector::from_config(&config)?;
    let credentials = config
        .default_credentials()
        .or_else(|| connector.is_stub().then(stub_credentials).flatten())
        .ok_or(ArmtekCommandError::NoAccount)?;
    Ok((config, credentials, connector))
}

/// Search and print the main offer with its alternates, or every row.
///
/// # Errors
///
/// Returns an error if nothing is configured or the search fails.
pub async fn search(query: &str, query_type: Option<i32>, all: bool) -> Result<(), ArmtekCommandError> {
    let parsed = split_pin_and_brand(query).map_err(|e| ArmtekCommandError::Query(e.to_string()))?;
    let (config, credentials, connector) = load()?;
    let context = credentials.search_context()?;
    let transport = connector.connect(&credentials)?;

    let items = SearchService::new(transport.as_ref())
        .with_row_parsing(config.row_parsing)
        .search(&context, &parsed.pin, parsed.brand.as_deref(), query_type)
        .await?;
    tracing::info!(rows = items.len(), "Search finished");

    if all {
        return Ok(print_json(&items)?);
    }
    match choose_first_non_analog(&items) {
        Some(main) => print_json(&json!({
            "item": main,
            "alt_articles": alternates_for(main, &items),
            "characteristics_token": tokens::characteristics_token(&main.artid),
        }))?,
        None => print_json(&json!({ "item": null, "rows": items.len() }))?,
    }
    Ok(())
}

/// Print sales organizations and the discovered search context.
///
/// # Errors
///
/// Returns an error if nothing is configured or discovery fails.
pub async fn profile() -> Result<(), ArmtekCommandError> {
    let (_, credentials, connector) = load()?;
    let transport = connector.connect(&credentials)?;
    let service = ProfileService::new(transport.as_ref());

    let vkorgs = service.get_vkorg_list().await?;
    let context = service.discover_context().await?;
    print_json(&json!({
        "login": credentials.login,
        "vkorg_list": vkorgs,
        "context": context,
    }))?;
    Ok(())
}

/// Print the API token (under the configured context) and the
/// characteristics token for an offer. Needs no network access.
///
/// # Errors
///
/// Returns an error if the configured context lacks `VKORG` or `KUNNR_RG`.
pub fn token(artid: &str, pin: &str, brand: Option<&str>) -> Result<(), ArmtekCommandError> {
    let config = ArmtekConfig::from_env()?;
    let context = config.default_context.into_search_context()?;

    print_json(&json!({
        "artid": artid,
        "api_token": tokens::api_token(artid, pin, brand, &context),
        "characteristics_token": tokens::characteristics_token(artid),
    }))?;
    Ok(())
}
