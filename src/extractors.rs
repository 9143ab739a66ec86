use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

/// Token of the session the middleware attached to this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl FromRequestParts<AppState> for SessionId {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionId>()
            .cloned()
            .ok_or_else(|| AppError::Internal("Missing session extension".into()))
    }
}

/// A logged-in session. Rejects anonymous sessions with 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub session: SessionId,
    pub username: String,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = SessionId::from_request_parts(parts, state).await?;
        let username = state
            .with_session(&session, |s| s.storage_user().map(str::to_string))
            .await
            .ok_or(AppError::Unauthorized)?;
        Ok(CurrentUser { session, username })
    }
}
