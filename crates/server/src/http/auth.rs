use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use domain::session;

use crate::state::AppState;

/// The user behind a valid `Authorization: Bearer <token>` header. Every
/// write is scoped to this id.
pub struct CurrentUser(pub String);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Missing Authorization header".to_string(),
            ))?;

        let token = header.strip_prefix("Bearer ").ok_or((
            StatusCode::UNAUTHORIZED,
            "Expected a Bearer token".to_string(),
        ))?;

        let user_id = session::verify_token(&state.session_secret, token).map_err(|e| {
            tracing::debug!("Rejected session token: {}", e);
            (StatusCode::UNAUTHORIZED, e.to_string())
        })?;

        Ok(CurrentUser(user_id))
    }
}
