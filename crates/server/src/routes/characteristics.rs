//! Characteristics callback endpoints.
//!
//! Called by the browser extension and the scraper, so they are
//! unauthenticated and answer CORS preflights.
//!
//! ```text
//! POST /api/armtek/characteristics   - report scraped fields for a token
//! GET  /api/armtek/characteristics   - poll a token (?token=...)
//! ```

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::armtek::parsing::value_text;
use crate::services::CharacteristicsUpdate;
use crate::state::AppState;

/// Build the characteristics router with its CORS policy.
pub fn router(allowed_origin: &str) -> Router<AppState> {
    Router::new()
        .route(
            "/api/armtek/characteristics",
            get(get_characteristics).post(post_characteristics),
        )
        .layer(cors_layer(allowed_origin))
}

fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let origin = match allowed_origin.trim() {
        "*" | "" => AllowOrigin::any(),
        exact => HeaderValue::from_str(exact).map_or_else(
            |_| {
                tracing::warn!(origin = exact, "Invalid EXTENSION_ALLOWED_ORIGIN, allowing any");
                AllowOrigin::any()
            },
            AllowOrigin::exact,
        ),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

fn invalid_payload() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"status": "error", "message": "Invalid payload"})),
    )
        .into_response()
}

/// Optional scalar field; lists and objects are rejected.
fn optional_field(body: &Map<String, Value>, name: &str) -> Result<Option<String>, ()> {
    match body.get(name) {
        Some(Value::Array(_) | Value::Object(_)) => Err(()),
        value => Ok(value_text(value)),
    }
}

fn parse_update(body: &Map<String, Value>) -> Result<(String, CharacteristicsUpdate), ()> {
    let token = optional_field(body, "token")?.ok_or(())?;
    let update = CharacteristicsUpdate {
        artid: optional_field(body, "artid")?,
        image_url: optional_field(body, "image_url")?,
        weight: optional_field(body, "weight")?,
        length: optional_field(body, "length")?,
        height: optional_field(body, "height")?,
        width: optional_field(body, "width")?,
        analog_code: optional_field(body, "analog_code")?,
    };
    Ok((token, update))
}

/// Store scraped fields. A missing token or malformed body is a 400.
async fn post_characteristics(State(state): State<AppState>, body: Bytes) -> Response {
    let Ok(Value::Object(body)) = serde_json::from_slice::<Value>(&body) else {
        return invalid_payload();
    };
    let Ok((token, update)) = parse_update(&body) else {
        return invalid_payload();
    };

    let record = state.characteristics().save(&token, update).await;
    tracing::info!(token = %record.token, artid = ?record.artid, "Characteristics received");

    Json(json!({"status": "ok"})).into_response()
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Poll a token: `not_found`, `pending`, or `ok` with the fields.
async fn get_characteristics(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Json<Value> {
    let token = query.token.unwrap_or_default();
    let token = token.trim();
    if token.is_empty() {
        return Json(json!({"status": "not_found"}));
    }

    match state.characteristics().get_by_token(token).await {
        None => Json(json!({"status": "not_found"})),
        Some(record) if !record.ready => Json(json!({"status": "pending"})),
        Some(record) => Json(json!({
            "status": "ok",
            "token": record.token,
            "artid": record.artid,
            "image_url": record.image_url,
            "weight": record.weight,
            "length": record.length,
            "height": record.height,
            "width": record.width,
            "analog_code": record.analog_code,
            "received_at": record.received_at,
            "normalized": record.normalized(),
        })),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_parse_update_accepts_scalars() {
        let (token, update) = parse_update(&body(json!({
            "token": " abc ",
            "artid": 123,
            "weight": "0,5 кг",
            "image_url": null
        })))
        .unwrap();

        assert_eq!(token, "abc");
        assert_eq!(update.artid.as_deref(), Some("123"));
        assert_eq!(update.weight.as_deref(), Some("0,5 кг"));
        assert!(update.image_url.is_none());
    }

    #[test]
    fn test_parse_update_rejects_missing_token() {
        assert!(parse_update(&body(json!({"artid": "1"}))).is_err());
        assert!(parse_update(&body(json!({"token": "  "}))).is_err());
    }

    #[test]
    fn test_parse_update_rejects_structured_fields() {
        assert!(parse_update(&body(json!({"token": "t", "weight": {"kg": 1}}))).is_err());
        assert!(parse_update(&body(json!({"token": ["t"]}))).is_err());
    }
}
