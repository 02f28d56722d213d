//! Product endpoints.
//!
//! ```text
//! GET /api/products                       - products from the caller's searches
//! GET /api/products?search_request_id=    - products of one of those searches
//! GET /api/products/{id}                  - one product
//! ```

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};

use elizabeth_core::{ProductId, SearchRequestId};

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::Product;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 200;

/// Build the product router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list))
        .route("/api/products/{id}", get(show))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Kept as text: a value that is not an id is ignored.
    pub search_request_id: Option<String>,
    pub limit: Option<usize>,
}

impl ListQuery {
    fn search_request_id(&self) -> Option<SearchRequestId> {
        self.search_request_id
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok())
            .map(SearchRequestId::new)
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub products: Vec<Product>,
}

async fn list(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let products = state
        .searches()
        .list_products(user_id, query.search_request_id(), limit)
        .await?;
    Ok(Json(ListResponse { products }))
}

/// A product from one of the caller's searches. Anything else is missing.
async fn show(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Product>, AppError> {
    let id = ProductId::new(id);
    let product = state
        .searches()
        .get_product(user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    Ok(Json(product))
}
