//! Search endpoints.
//!
//! ```text
//! POST /api/search          - search one query
//! POST /api/search/bulk     - search a list or a pasted block
//! GET  /api/search          - the caller's search history
//! GET  /api/search/{id}     - one search with its products
//! ```

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use elizabeth_core::{Provider, SearchRequestId};

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::SearchRequest;
use crate::services::{BulkInput, SearchOutcome};
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 200;

/// Build the search router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/search", post(search).get(history))
        .route("/api/search/bulk", post(bulk_search))
        .route("/api/search/{id}", get(show))
}

fn default_source() -> String {
    Provider::Armtek.as_str().to_string()
}

/// Request for a single search.
#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub query: String,
    #[serde(default = "default_source")]
    pub source: String,
}

/// Request for a bulk search. `queries` wins over `text`.
#[derive(Debug, Deserialize)]
pub struct BulkSearchBody {
    pub queries: Option<Vec<String>>,
    pub text: Option<String>,
    #[serde(default = "default_source")]
    pub source: String,
}

impl BulkSearchBody {
    fn into_input(self) -> Result<(BulkInput, String), AppError> {
        let input = match (self.queries, self.text) {
            (Some(queries), _) => BulkInput::Queries(queries),
            (None, Some(text)) => BulkInput::Text(text),
            (None, None) => {
                return Err(AppError::BadRequest(
                    "either queries or text is required".to_string(),
                ));
            }
        };
        Ok((input, self.source))
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub requests: Vec<SearchRequest>,
}

async fn search(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<SearchBody>,
) -> Result<(StatusCode, Json<SearchOutcome>), AppError> {
    let outcome = state
        .search_flow()
        .perform_search(&[body.query], Some(user_id), &body.source)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn bulk_search(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<BulkSearchBody>,
) -> Result<(StatusCode, Json<SearchOutcome>), AppError> {
    let (input, source) = body.into_input()?;
    let outcome = state
        .search_flow()
        .perform_bulk_search(input, Some(user_id), &source)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn history(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let requests = state.searches().list_requests(user_id, limit).await?;
    Ok(Json(HistoryResponse { requests }))
}

/// One of the caller's searches. Other users' searches are reported missing.
async fn show(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SearchOutcome>, AppError> {
    let id = SearchRequestId::new(id);
    let request = state
        .searches()
        .get_request(id)
        .await?
        .filter(|r| r.user_id == Some(user_id))
        .ok_or_else(|| AppError::NotFound(format!("search {id}")))?;
    let products = state.searches().products_for_request(id).await?;
    Ok(Json(SearchOutcome { request, products }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_search_body_defaults_source() {
        let body: SearchBody = serde_json::from_str(r#"{"query": "OC90"}"#).unwrap();
        assert_eq!(body.source, "armtek");
    }

    #[test]
    fn test_bulk_body_prefers_queries() {
        let body: BulkSearchBody =
            serde_json::from_str(r#"{"queries": ["A"], "text": "B, C"}"#).unwrap();
        let (input, source) = body.into_input().unwrap();
        assert_eq!(input, BulkInput::Queries(vec!["A".to_string()]));
        assert_eq!(source, "armtek");
    }

    #[test]
    fn test_bulk_body_requires_input() {
        let body: BulkSearchBody = serde_json::from_str(r#"{"source": "armtek"}"#).unwrap();
        assert!(matches!(body.into_input(), Err(AppError::BadRequest(_))));
    }
}
