//! Persistence for search history, products and provider accounts.
//!
//! # Stores
//!
//! - [`SearchStore`] - search requests and the products they produced
//! - [`ProviderAccountStore`] - per-user provider logins
//!
//! Both have a `PostgreSQL` implementation ([`PgStore`]) and an in-memory
//! one ([`MemoryStore`]) used when `DATABASE_URL` is unset and in tests.
//!
//! # Migrations
//!
//! The schema lives in `crates/server/migrations/` and is applied with:
//! ```bash
//! cargo run -p elizabeth-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use elizabeth_core::{ProductId, ProviderAccountId, SearchRequestId, SearchStatus, UserId};

use crate::armtek::PartialContext;
use crate::models::{Product, ProductDraft, ProviderAccount, SearchRequest};

pub use memory::MemoryStore;
pub use postgres::{MigrateError, PgStore, run_migrations};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::DataCorruption(err.to_string())
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Fields needed to create or replace a provider account.
#[derive(Debug, Clone)]
pub struct NewProviderAccount {
    pub user_id: UserId,
    pub provider: String,
    pub login: String,
    pub encrypted_password: String,
    pub context: PartialContext,
}

/// Search requests and the products they produced.
#[async_trait]
pub trait SearchStore: Send + Sync {
    /// Record a new `pending` request.
    async fn create_request(
        &self,
        user_id: Option<UserId>,
        source: &str,
        query_string: &str,
    ) -> Result<SearchRequest, RepositoryError>;

    /// Move a request to `status`, optionally recording its item count.
    ///
    /// Returns `RepositoryError::NotFound` for an unknown id.
    async fn set_request_status(
        &self,
        id: SearchRequestId,
        status: SearchStatus,
        total_items: Option<i32>,
    ) -> Result<(), RepositoryError>;

    async fn get_request(
        &self,
        id: SearchRequestId,
    ) -> Result<Option<SearchRequest>, RepositoryError>;

    /// Most recent requests of a user, newest first.
    async fn list_requests(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<SearchRequest>, RepositoryError>;

    /// Upsert all drafts by `(artid, source)` and link them to the request.
    ///
    /// A product fetched less than `ttl` ago keeps its stored values; a stale
    /// or missing one is written from the draft and restamped. Either every
    /// draft is written or none is. The result follows the draft order.
    async fn persist_products(
        &self,
        request_id: SearchRequestId,
        user_id: Option<UserId>,
        source: &str,
        drafts: &[ProductDraft],
        ttl: Duration,
    ) -> Result<Vec<Product>, RepositoryError>;

    /// Products linked to a request, in the order they were produced.
    async fn products_for_request(
        &self,
        request_id: SearchRequestId,
    ) -> Result<Vec<Product>, RepositoryError>;

    /// Products produced by the user's searches, newest first.
    ///
    /// With `search_request_id`, only that request's products are listed;
    /// a request of another user yields nothing.
    async fn list_products(
        &self,
        user_id: UserId,
        search_request_id: Option<SearchRequestId>,
        limit: usize,
    ) -> Result<Vec<Product>, RepositoryError>;

    /// A product, if one of the user's searches produced it.
    async fn get_product(
        &self,
        user_id: UserId,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError>;
}

/// Stored provider logins, one per `(user, provider)`.
#[async_trait]
pub trait ProviderAccountStore: Send + Sync {
    async fn get_account(
        &self,
        user_id: UserId,
        provider: &str,
    ) -> Result<Option<ProviderAccount>, RepositoryError>;

    /// Create the account or replace login, password and context.
    async fn save_account(
        &self,
        account: NewProviderAccount,
    ) -> Result<ProviderAccount, RepositoryError>;

    /// Replace the cached context fields.
    ///
    /// Returns `RepositoryError::NotFound` for an unknown id.
    async fn update_context(
        &self,
        id: ProviderAccountId,
        context: &PartialContext,
    ) -> Result<ProviderAccount, RepositoryError>;

    /// Returns whether an account was removed.
    async fn delete_account(&self, user_id: UserId, provider: &str)
    -> Result<bool, RepositoryError>;
}
