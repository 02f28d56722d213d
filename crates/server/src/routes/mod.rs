//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                              - Liveness check
//!
//! # Search (X-User-Id required)
//! POST   /api/search                          - Search one query
//! POST   /api/search/bulk                     - Search a list or a text block
//! GET    /api/search                          - Search history
//! GET    /api/search/{id}                     - One search with its products
//!
//! # Products (X-User-Id required)
//! GET    /api/products?search_request_id=     - Products from own searches
//! GET    /api/products/{id}                   - One product
//!
//! # Characteristics callbacks (unauthenticated, CORS)
//! POST   /api/armtek/characteristics          - Report scraped fields
//! GET    /api/armtek/characteristics?token=   - Poll a token
//!
//! # Provider credentials (X-User-Id required)
//! GET    /api/providers/armtek/credentials    - Effective login and context
//! POST   /api/providers/armtek/credentials    - Save and discover context
//! DELETE /api/providers/armtek/credentials    - Remove stored account
//! ```

pub mod characteristics;
pub mod credentials;
pub mod products;
pub mod search;

use axum::{Router, routing::get};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::state::AppState;

/// Build the complete application router with request tracing.
pub fn app(state: AppState) -> Router {
    let allowed_origin = state.config().extension_allowed_origin.clone();

    Router::new()
        .route("/health", get(health))
        .merge(search::router())
        .merge(products::router())
        .merge(credentials::router())
        .merge(characteristics::router(&allowed_origin))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}
