//! Stored Armtek credentials for the calling user.
//!
//! ```text
//! GET    /api/providers/armtek/credentials   - effective login and context (204 if none)
//! POST   /api/providers/armtek/credentials   - save, then discover the context
//! DELETE /api/providers/armtek/credentials   - forget the stored account
//! ```

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use secrecy::SecretString;
use serde::Deserialize;

use crate::armtek::PartialContext;
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

/// Build the credentials router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/providers/armtek/credentials",
        get(show).post(save).delete(remove),
    )
}

/// Login, password and optional context overrides.
#[derive(Deserialize)]
pub struct CredentialsBody {
    pub login: String,
    pub password: String,
    #[serde(flatten)]
    pub context: PartialContext,
}

async fn show(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    Ok(match state.credentials().current_context(user_id).await? {
        Some(summary) => Json(summary).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

async fn save(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<CredentialsBody>,
) -> Result<Response, AppError> {
    let password = SecretString::from(body.password);
    let credentials = state.credentials();
    let account = credentials
        .save_account(user_id, &body.login, &password, body.context)
        .await?;
    credentials
        .update_account_context(&account, state.connector())
        .await?;

    Ok(match credentials.current_context(user_id).await? {
        Some(summary) => Json(summary).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

async fn remove(
    CurrentUser(user_id): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let removed = state.credentials().delete_account(user_id).await?;
    tracing::info!(%user_id, removed, "Armtek account delete requested");
    Ok(StatusCode::NO_CONTENT)
}
