//! Armtek credential resolution and stored provider accounts.
//!
//! Resolution order for a user:
//! 1. their stored account, if its password decrypts, with missing context
//!    fields taken from the configured defaults
//! 2. the configured `ARMTEK_LOGIN` / `ARMTEK_PASSWORD` and context
//! 3. nothing

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::instrument;

use elizabeth_core::{Provider, UserId};

use super::secrets::SecretCipher;
use crate::armtek::{ArmtekConnector, ArmtekError, Credentials, PartialContext, ProfileService};
use crate::config::ArmtekConfig;
use crate::db::{NewProviderAccount, ProviderAccountStore, RepositoryError};
use crate::error::AppError;
use crate::models::ProviderAccount;

const PROVIDER: &str = Provider::Armtek.as_str();

/// Where resolved credentials came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    Account,
    Defaults,
}

/// Login and effective context, without the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialSummary {
    pub login: String,
    pub source: CredentialSource,
    #[serde(flatten)]
    pub context: PartialContext,
}

/// Credential operations over the account store.
pub struct CredentialService<'a> {
    accounts: &'a dyn ProviderAccountStore,
    cipher: &'a SecretCipher,
    config: &'a ArmtekConfig,
}

impl<'a> CredentialService<'a> {
    #[must_use]
    pub fn new(
        accounts: &'a dyn ProviderAccountStore,
        cipher: &'a SecretCipher,
        config: &'a ArmtekConfig,
    ) -> Self {
        Self {
            accounts,
            cipher,
            config,
        }
    }

    /// Credentials stored on `account`, with defaults filling its context.
    ///
    /// `None` when the password does not decrypt or is blank.
    #[must_use]
    pub fn account_credentials(&self, account: &ProviderAccount) -> Option<Credentials> {
        let password = self.cipher.decrypt(&account.encrypted_password)?;
        let context = account.context.clone().or(&self.config.default_context);
        Credentials::new(&account.login, password, context)
    }

    async fn resolve_with_source(
        &self,
        user_id: Option<UserId>,
    ) -> Result<Option<(Credentials, CredentialSource)>, RepositoryError> {
        if let Some(user_id) = user_id
            && let Some(account) = self.accounts.get_account(user_id, PROVIDER).await?
        {
            match self.account_credentials(&account) {
                Some(credentials) => return Ok(Some((credentials, CredentialSource::Account))),
                None => tracing::warn!(
                    account_id = %account.id,
                    "Stored Armtek password unusable, falling back to defaults"
                ),
            }
        }

        Ok(self
            .config
            .default_credentials()
            .map(|credentials| (credentials, CredentialSource::Defaults)))
    }

    /// Credentials to search with on behalf of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the account lookup fails.
    #[instrument(skip(self))]
    pub async fn resolve_credentials(
        &self,
        user_id: Option<UserId>,
    ) -> Result<Option<Credentials>, RepositoryError> {
        Ok(self
            .resolve_with_source(user_id)
            .await?
            .map(|(credentials, _)| credentials))
    }

    /// Login and effective context for `user_id`, if any credentials resolve.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the account lookup fails.
    pub async fn current_context(
        &self,
        user_id: UserId,
    ) -> Result<Option<CredentialSummary>, RepositoryError> {
        Ok(self
            .resolve_with_source(Some(user_id))
            .await?
            .map(|(credentials, source)| CredentialSummary {
                login: credentials.login,
                source,
                context: credentials.context,
            }))
    }

    /// Create or replace the user's account with an encrypted password.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a blank login or password,
    /// `AppError::Internal` if encryption fails, or a database error.
    #[instrument(skip(self, password, overrides))]
    pub async fn save_account(
        &self,
        user_id: UserId,
        login: &str,
        password: &SecretString,
        overrides: PartialContext,
    ) -> Result<ProviderAccount, AppError> {
        let login = login.trim();
        if login.is_empty() || password.expose_secret().is_empty() {
            return Err(AppError::BadRequest(
                "login and password are required".to_string(),
            ));
        }

        let encrypted_password = self
            .cipher
            .encrypt(password.expose_secret())
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let account = self
            .accounts
            .save_account(NewProviderAccount {
                user_id,
                provider: PROVIDER.to_string(),
                login: login.to_string(),
                encrypted_password,
                context: overrides,
            })
            .await?;

        tracing::info!(account_id = %account.id, "Saved Armtek account");
        Ok(account)
    }

    /// Discover the search context with the account's own credentials and
    /// store it. Fields already set on the account are kept.
    ///
    /// # Errors
    ///
    /// Returns `ArmtekError::Credentials` if the stored password is unusable,
    /// any discovery error, or a database error.
    #[instrument(skip(self, account, connector), fields(account_id = %account.id))]
    pub async fn update_account_context(
        &self,
        account: &ProviderAccount,
        connector: &dyn ArmtekConnector,
    ) -> Result<ProviderAccount, AppError> {
        let password = self
            .cipher
            .decrypt(&account.encrypted_password)
            .ok_or_else(|| {
                ArmtekError::Credentials("stored Armtek password cannot be decrypted".to_string())
            })?;
        let credentials = Credentials::new(&account.login, password, account.context.clone())
            .ok_or_else(|| ArmtekError::Credentials("Armtek login is empty".to_string()))?;

        let transport = connector.connect(&credentials)?;
        let discovered = ProfileService::new(transport.as_ref())
            .discover_context()
            .await?;

        let merged = account.context.clone().or(&discovered.into());
        Ok(self.accounts.update_context(account.id, &merged).await?)
    }

    /// Remove the user's account. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the delete fails.
    pub async fn delete_account(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        self.accounts.delete_account(user_id, PROVIDER).await
    }
}
