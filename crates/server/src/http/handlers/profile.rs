use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use super::internal_error;
use crate::{http::auth::CurrentUser, state::AppState};

#[derive(Deserialize)]
pub struct ProfileRequest {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

pub async fn put_profile(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<ProfileRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .db
        .upsert_profile(
            &user_id,
            payload.display_name.as_deref(),
            payload.avatar_url.as_deref(),
        )
        .await
        .map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}
