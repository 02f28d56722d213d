//! End-to-end search: history record, upstream lookups, product writes.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use elizabeth_core::{Provider, SearchRequestId, SearchStatus, UserId};

use super::characteristics::CharacteristicsStore;
use super::credentials::CredentialService;
use super::query::{split_bulk_input, split_pin_and_brand};
use crate::armtek::connector::stub_credentials;
use crate::armtek::tokens::{api_token, characteristics_token};
use crate::armtek::{
    ArmtekConnector, ArmtekError, RowParsing, SearchService, alternates_for,
    choose_first_non_analog,
};
use crate::db::{RepositoryError, SearchStore};
use crate::error::AppError;
use crate::models::{Product, ProductDraft, SearchRequest};

/// A finished search with the products it produced, in query order.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub request: SearchRequest,
    pub products: Vec<Product>,
}

/// Queries for a bulk search: an explicit list or a pasted block of text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum BulkInput {
    Queries(Vec<String>),
    Text(String),
}

impl BulkInput {
    /// Non-blank queries, in input order.
    #[must_use]
    pub fn into_queries(self) -> Vec<String> {
        match self {
            Self::Queries(queries) => queries
                .into_iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .collect(),
            Self::Text(text) => split_bulk_input(&text),
        }
    }
}

/// Dependencies of a search run.
pub struct SearchFlow<'a> {
    pub searches: &'a dyn SearchStore,
    pub credentials: CredentialService<'a>,
    pub connector: &'a dyn ArmtekConnector,
    pub characteristics: &'a CharacteristicsStore,
    pub row_parsing: RowParsing,
    /// Products fetched more recently than this are not rewritten.
    pub cache_ttl: Duration,
}

impl SearchFlow<'_> {
    /// Run one search per query and store the main offer of each.
    ///
    /// The request is recorded first and ends `done` or `failed`. Unknown
    /// sources complete immediately with no products.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadQuery` for an empty query list or an
    /// unparsable query, `ArmtekError::Credentials` when no credentials
    /// resolve, and any upstream or database error. Every error after the
    /// request was recorded also marks it `failed`.
    #[instrument(skip(self, queries), fields(count = queries.len()))]
    pub async fn perform_search(
        &self,
        queries: &[String],
        user_id: Option<UserId>,
        source: &str,
    ) -> Result<SearchOutcome, AppError> {
        if queries.is_empty() {
            return Err(AppError::BadQuery("no queries given".to_string()));
        }

        let source = source.trim().to_lowercase();
        let request = self
            .searches
            .create_request(user_id, &source, &queries.join("\n"))
            .await?;

        let Ok(provider) = Provider::from_str(&source) else {
            tracing::info!(%source, "No integration for source, nothing to search");
            return self.finish(request.id, SearchStatus::Done, Vec::new()).await;
        };

        self.searches
            .set_request_status(request.id, SearchStatus::InProgress, None)
            .await?;

        let result = match self.run(request.id, queries, user_id, provider).await {
            Ok(products) => {
                tracing::info!(
                    request_id = %request.id,
                    products = products.len(),
                    "Search complete"
                );
                self.finish(request.id, SearchStatus::Done, products).await
            }
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            tracing::warn!(request_id = %request.id, error = %err, "Search failed");
            self.mark_failed(request.id).await;
        }
        result
    }

    /// Search every query of a list or a pasted text block.
    ///
    /// # Errors
    ///
    /// See [`perform_search`](Self::perform_search).
    pub async fn perform_bulk_search(
        &self,
        input: BulkInput,
        user_id: Option<UserId>,
        source: &str,
    ) -> Result<SearchOutcome, AppError> {
        self.perform_search(&input.into_queries(), user_id, source)
            .await
    }

    async fn run(
        &self,
        request_id: SearchRequestId,
        queries: &[String],
        user_id: Option<UserId>,
        provider: Provider,
    ) -> Result<Vec<Product>, AppError> {
        let credentials = match self.credentials.resolve_credentials(user_id).await? {
            Some(credentials) => credentials,
            None if self.connector.is_stub() => stub_credentials().ok_or_else(|| {
                AppError::Internal("stub credentials are invalid".to_string())
            })?,
            None => {
                return Err(ArmtekError::Credentials(
                    "Armtek credentials are not configured".to_string(),
                )
                .into());
            }
        };
        let context = credentials.search_context()?;
        let transport = self.connector.connect(&credentials)?;
        let service =
            SearchService::new(transport.as_ref()).with_row_parsing(self.row_parsing);

        let mut drafts = Vec::with_capacity(queries.len());
        for query in queries {
            let parsed = split_pin_and_brand(query)?;
            let items = service
                .search(&context, &parsed.pin, parsed.brand.as_deref(), None)
                .await?;

            let Some(main) = choose_first_non_analog(&items) else {
                tracing::debug!(pin = %parsed.pin, "No direct offer");
                continue;
            };

            drafts.push(ProductDraft {
                alt_articles: alternates_for(main, &items),
                api_token: api_token(&main.artid, &main.pin, Some(&main.brand), &context),
                characteristics_token: characteristics_token(&main.artid),
                item: main.clone(),
            });
        }

        let products = self
            .searches
            .persist_products(
                request_id,
                user_id,
                provider.as_str(),
                &drafts,
                self.cache_ttl,
            )
            .await?;

        for product in &products {
            self.characteristics
                .register(&product.characteristics_token, &product.item.artid)
                .await;
        }

        Ok(products)
    }

    async fn mark_failed(&self, id: SearchRequestId) {
        if let Err(err) = self
            .searches
            .set_request_status(id, SearchStatus::Failed, None)
            .await
        {
            tracing::error!(request_id = %id, error = %err, "Could not mark search as failed");
        }
    }

    async fn finish(
        &self,
        id: SearchRequestId,
        status: SearchStatus,
        products: Vec<Product>,
    ) -> Result<SearchOutcome, AppError> {
        let total = i32::try_from(products.len()).unwrap_or(i32::MAX);
        self.searches
            .set_request_status(id, status, Some(total))
            .await?;
        let request = self
            .searches
            .get_request(id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        Ok(SearchOutcome { request, products })
    }
}
