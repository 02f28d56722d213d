//! `PostgreSQL` implementation of the store traits.
//!
//! Queries are built at runtime with `sqlx::query_as` and mapped through
//! internal row types, so the crate compiles without a live database.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use elizabeth_core::{ProductId, ProviderAccountId, SearchRequestId, SearchStatus, UserId};

use super::{NewProviderAccount, ProviderAccountStore, RepositoryError, SearchStore};
use crate::armtek::{AltArticle, PartialContext, SearchItem};
use crate::models::{Product, ProductDraft, ProviderAccount, SearchRequest};

/// Error returned by [`run_migrations`].
pub type MigrateError = sqlx::migrate::MigrateError;

/// Apply the embedded schema migrations.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

// =============================================================================
// Internal Row Types
// =============================================================================

const REQUEST_COLUMNS: &str =
    "id, user_id, source, query_string, status, total_items, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct SearchRequestRow {
    id: i32,
    user_id: Option<i32>,
    source: String,
    query_string: String,
    status: SearchStatus,
    total_items: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SearchRequestRow> for SearchRequest {
    fn from(row: SearchRequestRow) -> Self {
        Self {
            id: SearchRequestId::new(row.id),
            user_id: row.user_id.map(UserId::new),
            source: row.source,
            query_string: row.query_string,
            status: row.status,
            total_items: row.total_items,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PRODUCT_COLUMNS: &str = "p.id, p.user_id, p.search_request_id, p.source, p.details, \
     p.alt_articles, p.api_token, p.characteristics_token, p.fetched_at, p.created_at, p.updated_at";

/// Products linked to a search request of the user bound as `$1`.
const VISIBLE_TO_USER: &str = "EXISTS (SELECT 1 FROM search_request_products l \
     JOIN search_requests r ON r.id = l.search_request_id \
     WHERE l.product_id = p.id AND r.user_id = $1)";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    user_id: Option<i32>,
    search_request_id: Option<i32>,
    source: String,
    details: serde_json::Value,
    alt_articles: serde_json::Value,
    api_token: String,
    characteristics_token: String,
    fetched_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let item: SearchItem = serde_json::from_value(row.details)?;
        let alt_articles: Vec<AltArticle> = serde_json::from_value(row.alt_articles)?;

        Ok(Self {
            id: ProductId::new(row.id),
            user_id: row.user_id.map(UserId::new),
            search_request_id: row.search_request_id.map(SearchRequestId::new),
            source: row.source,
            item,
            alt_articles,
            api_token: row.api_token,
            characteristics_token: row.characteristics_token,
            fetched_at: row.fetched_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ACCOUNT_COLUMNS: &str = "id, user_id, provider, login, encrypted_password, vkorg, kunnr_rg, \
     program, kunnr_za, incoterms, vbeln, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ProviderAccountRow {
    id: i32,
    user_id: i32,
    provider: String,
    login: String,
    encrypted_password: String,
    vkorg: Option<String>,
    kunnr_rg: Option<String>,
    program: Option<String>,
    kunnr_za: Option<String>,
    incoterms: Option<i32>,
    vbeln: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProviderAccountRow> for ProviderAccount {
    fn from(row: ProviderAccountRow) -> Self {
        Self {
            id: ProviderAccountId::new(row.id),
            user_id: UserId::new(row.user_id),
            provider: row.provider,
            login: row.login,
            encrypted_password: row.encrypted_password,
            context: PartialContext {
                vkorg: row.vkorg,
                kunnr_rg: row.kunnr_rg,
                program: row.program,
                kunnr_za: row.kunnr_za,
                incoterms: row.incoterms,
                vbeln: row.vbeln,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SearchStore for PgStore {
    async fn create_request(
        &self,
        user_id: Option<UserId>,
        source: &str,
        query_string: &str,
    ) -> Result<SearchRequest, RepositoryError> {
        let row = sqlx::query_as::<_, SearchRequestRow>(&format!(
            "INSERT INTO search_requests (user_id, source, query_string) \
             VALUES ($1, $2, $3) RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(user_id.map(|u| u.as_i32()))
        .bind(source)
        .bind(query_string)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn set_request_status(
        &self,
        id: SearchRequestId,
        status: SearchStatus,
        total_items: Option<i32>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE search_requests \
             SET status = $1, total_items = COALESCE($2, total_items), updated_at = now() \
             WHERE id = $3",
        )
        .bind(status)
        .bind(total_items)
        .bind(id.as_i32())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn get_request(
        &self,
        id: SearchRequestId,
    ) -> Result<Option<SearchRequest>, RepositoryError> {
        let row = sqlx::query_as::<_, SearchRequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM search_requests WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_requests(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<SearchRequest>, RepositoryError> {
        let rows = sqlx::query_as::<_, SearchRequestRow>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM search_requests \
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2"
        ))
        .bind(user_id.as_i32())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(skip(self, drafts), fields(count = drafts.len()))]
    async fn persist_products(
        &self,
        request_id: SearchRequestId,
        user_id: Option<UserId>,
        source: &str,
        drafts: &[ProductDraft],
        ttl: Duration,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(drafts.len());

        for (position, draft) in drafts.iter().enumerate() {
            let details = serde_json::to_value(&draft.item)?;
            let alt_articles = serde_json::to_value(&draft.alt_articles)?;
            let price: Option<Decimal> = draft.item.price;

            // No row comes back when the stored product is still fresh.
            let written = sqlx::query_as::<_, ProductRow>(&format!(
                "INSERT INTO products AS p (user_id, search_request_id, source, artid, pin, brand, \
                     name, price, currency, details, alt_articles, api_token, characteristics_token) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
                 ON CONFLICT (artid, source) DO UPDATE SET \
                     user_id = EXCLUDED.user_id, \
                     search_request_id = EXCLUDED.search_request_id, \
                     pin = EXCLUDED.pin, brand = EXCLUDED.brand, name = EXCLUDED.name, \
                     price = EXCLUDED.price, currency = EXCLUDED.currency, \
                     details = EXCLUDED.details, alt_articles = EXCLUDED.alt_articles, \
                     api_token = EXCLUDED.api_token, \
                     characteristics_token = EXCLUDED.characteristics_token, \
                     fetched_at = now(), updated_at = now() \
                 WHERE p.fetched_at <= now() - make_interval(secs => $14) \
                 RETURNING {PRODUCT_COLUMNS}"
            ))
            .bind(user_id.map(|u| u.as_i32()))
            .bind(request_id.as_i32())
            .bind(source)
            .bind(&draft.item.artid)
            .bind(&draft.item.pin)
            .bind(&draft.item.brand)
            .bind(&draft.item.name)
            .bind(price)
            .bind(draft.item.currency.as_deref())
            .bind(&details)
            .bind(&alt_articles)
            .bind(&draft.api_token)
            .bind(&draft.characteristics_token)
            .bind(ttl.as_secs_f64())
            .fetch_optional(&mut *tx)
            .await?;

            let row = match written {
                Some(row) => row,
                None => {
                    sqlx::query_as::<_, ProductRow>(&format!(
                        "SELECT {PRODUCT_COLUMNS} FROM products p \
                         WHERE p.artid = $1 AND p.source = $2"
                    ))
                    .bind(&draft.item.artid)
                    .bind(source)
                    .fetch_one(&mut *tx)
                    .await?
                }
            };

            let product = Product::try_from(row)?;

            sqlx::query(
                "INSERT INTO search_request_products (search_request_id, position, product_id) \
                 VALUES ($1, $2, $3)",
            )
            .bind(request_id.as_i32())
            .bind(i32::try_from(position).unwrap_or(i32::MAX))
            .bind(product.id.as_i32())
            .execute(&mut *tx)
            .await?;

            saved.push(product);
        }

        tx.commit().await?;
        Ok(saved)
    }

    async fn products_for_request(
        &self,
        request_id: SearchRequestId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM search_request_products l \
             JOIN products p ON p.id = l.product_id \
             WHERE l.search_request_id = $1 ORDER BY l.position"
        ))
        .bind(request_id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_products(
        &self,
        user_id: UserId,
        search_request_id: Option<SearchRequestId>,
        limit: usize,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE {VISIBLE_TO_USER} \
             AND ($2::int IS NULL OR EXISTS ( \
                 SELECT 1 FROM search_request_products f \
                 WHERE f.product_id = p.id AND f.search_request_id = $2)) \
             ORDER BY p.created_at DESC, p.id DESC LIMIT $3"
        ))
        .bind(user_id.as_i32())
        .bind(search_request_id.map(|id| id.as_i32()))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_product(
        &self,
        user_id: UserId,
        id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $2 AND {VISIBLE_TO_USER}"
        ))
        .bind(user_id.as_i32())
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}

#[async_trait]
impl ProviderAccountStore for PgStore {
    async fn get_account(
        &self,
        user_id: UserId,
        provider: &str,
    ) -> Result<Option<ProviderAccount>, RepositoryError> {
        let row = sqlx::query_as::<_, ProviderAccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM provider_accounts WHERE user_id = $1 AND provider = $2"
        ))
        .bind(user_id.as_i32())
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn save_account(
        &self,
        account: NewProviderAccount,
    ) -> Result<ProviderAccount, RepositoryError> {
        let context = account.context;
        let row = sqlx::query_as::<_, ProviderAccountRow>(&format!(
            "INSERT INTO provider_accounts (user_id, provider, login, encrypted_password, \
                 vkorg, kunnr_rg, program, kunnr_za, incoterms, vbeln) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (user_id, provider) DO UPDATE SET \
                 login = EXCLUDED.login, encrypted_password = EXCLUDED.encrypted_password, \
                 vkorg = EXCLUDED.vkorg, kunnr_rg = EXCLUDED.kunnr_rg, \
                 program = EXCLUDED.program, kunnr_za = EXCLUDED.kunnr_za, \
                 incoterms = EXCLUDED.incoterms, vbeln = EXCLUDED.vbeln, updated_at = now() \
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(account.user_id.as_i32())
        .bind(&account.provider)
        .bind(&account.login)
        .bind(&account.encrypted_password)
        .bind(context.vkorg)
        .bind(context.kunnr_rg)
        .bind(context.program)
        .bind(context.kunnr_za)
        .bind(context.incoterms)
        .bind(context.vbeln)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn update_context(
        &self,
        id: ProviderAccountId,
        context: &PartialContext,
    ) -> Result<ProviderAccount, RepositoryError> {
        let row = sqlx::query_as::<_, ProviderAccountRow>(&format!(
            "UPDATE provider_accounts SET vkorg = $1, kunnr_rg = $2, program = $3, \
                 kunnr_za = $4, incoterms = $5, vbeln = $6, updated_at = now() \
             WHERE id = $7 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(context.vkorg.as_deref())
        .bind(context.kunnr_rg.as_deref())
        .bind(context.program.as_deref())
        .bind(context.kunnr_za.as_deref())
        .bind(context.incoterms)
        .bind(context.vbeln.as_deref())
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    async fn delete_account(
        &self,
        user_id: UserId,
        provider: &str,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM provider_accounts WHERE user_id = $1 AND provider = $2")
                .bind(user_id.as_i32())
                .bind(provider)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
