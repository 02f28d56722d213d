//! Caller identity.
//!
//! Authentication happens in a fronting proxy, which forwards the
//! authenticated principal in the `X-User-Id` header.

use axum::{extract::FromRequestParts, http::request::Parts};

use elizabeth_core::UserId;

use crate::error::{AppError, set_sentry_user};

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor that requires an authenticated user.
///
/// Rejects with 401 when the header is missing or not a positive integer.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CurrentUser(user_id): CurrentUser) -> impl IntoResponse {
///     format!("Hello, user {user_id}!")
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

fn parse_user_id(value: &str) -> Option<UserId> {
    value
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
        .map(UserId::new)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_user_id)
            .ok_or_else(|| AppError::Unauthorized("missing or invalid X-User-Id".to_string()))?;

        set_sentry_user(user_id.as_i32());
        Ok(Self(user_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<CurrentUser, AppError> {
        let mut builder = Request::builder().uri("/api/search");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        CurrentUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_valid_header() {
        let user = extract(Some(" 42 ")).await.unwrap();
        assert_eq!(user, CurrentUser(UserId::new(42)));
    }

    #[tokio::test]
    async fn test_missing_or_invalid_header() {
        assert!(matches!(extract(None).await, Err(AppError::Unauthorized(_))));
        assert!(matches!(extract(Some("abc")).await, Err(AppError::Unauthorized(_))));
        assert!(matches!(extract(Some("0")).await, Err(AppError::Unauthorized(_))));
    }
}
