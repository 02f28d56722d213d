//! Application state shared across handlers.

use std::sync::Arc;

use crate::armtek::{ArmtekConnector, HttpConnector};
use crate::config::ServerConfig;
use crate::db::{ProviderAccountStore, SearchStore};
use crate::services::{CharacteristicsStore, CredentialService, SearchFlow, SecretCipher};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Stores are trait objects so the same router
/// runs on `PostgreSQL` or in memory.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    searches: Arc<dyn SearchStore>,
    accounts: Arc<dyn ProviderAccountStore>,
    connector: Arc<dyn ArmtekConnector>,
    cipher: SecretCipher,
    characteristics: CharacteristicsStore,
}

impl AppState {
    /// Create the application state.
    ///
    /// # Errors
    ///
    /// Returns `ArmtekError::Http` if the shared HTTP client cannot be built.
    pub fn new(
        config: ServerConfig,
        searches: Arc<dyn SearchStore>,
        accounts: Arc<dyn ProviderAccountStore>,
    ) -> Result<Self, crate::armtek::ArmtekError> {
        let connector = Arc::new(HttpConnector::from_config(&config.armtek)?);
        Ok(Self::with_connector(config, searches, accounts, connector))
    }

    /// Create the application state with a custom connector.
    #[must_use]
    pub fn with_connector(
        config: ServerConfig,
        searches: Arc<dyn SearchStore>,
        accounts: Arc<dyn ProviderAccountStore>,
        connector: Arc<dyn ArmtekConnector>,
    ) -> Self {
        let cipher = SecretCipher::new(&config.provider_secret_key);
        let characteristics = CharacteristicsStore::new(config.characteristics);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                searches,
                accounts,
                connector,
                cipher,
                characteristics,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn searches(&self) -> &dyn SearchStore {
        self.inner.searches.as_ref()
    }

    #[must_use]
    pub fn connector(&self) -> &dyn ArmtekConnector {
        self.inner.connector.as_ref()
    }

    #[must_use]
    pub fn characteristics(&self) -> &CharacteristicsStore {
        &self.inner.characteristics
    }

    /// Credential operations for the configured account store.
    #[must_use]
    pub fn credentials(&self) -> CredentialService<'_> {
        CredentialService::new(
            self.inner.accounts.as_ref(),
            &self.inner.cipher,
            &self.inner.config.armtek,
        )
    }

    /// A search run bound to this state.
    #[must_use]
    pub fn search_flow(&self) -> SearchFlow<'_> {
        SearchFlow {
            searches: self.searches(),
            credentials: self.credentials(),
            connector: self.connector(),
            characteristics: self.characteristics(),
            row_parsing: self.inner.config.armtek.row_parsing,
            cache_ttl: self.inner.config.search_cache_ttl,
        }
    }
}
