use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::{comments::MutationResponse, internal_error};
use crate::{http::auth::CurrentUser, state::AppState};

#[derive(Deserialize)]
pub struct LikeRequest {
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct LikeScope {
    pub user_id: Option<String>,
}

pub async fn like_comment(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(comment_id): Path<String>,
    Json(payload): Json<LikeRequest>,
) -> Result<(StatusCode, Json<MutationResponse>), (StatusCode, String)> {
    if payload.user_id != user_id {
        return Err((
            StatusCode::FORBIDDEN,
            "user_id does not match the session".to_string(),
        ));
    }

    let affected = match state.db.insert_like(&comment_id, &user_id).await {
        Ok(n) => n,
        Err(e) if storage::is_unique_violation(&e) => {
            return Err((StatusCode::CONFLICT, "Already liked".to_string()));
        }
        Err(e) => return Err(internal_error(e)),
    };

    // a missing comment is not an error, it just likes nothing
    let status = if affected == 0 {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(MutationResponse { affected })))
}

pub async fn unlike_comment(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(comment_id): Path<String>,
    Query(scope): Query<LikeScope>,
) -> Result<Json<MutationResponse>, (StatusCode, String)> {
    if scope.user_id.as_deref().is_some_and(|u| u != user_id) {
        return Ok(Json(MutationResponse { affected: 0 }));
    }

    let affected = state
        .db
        .delete_like(&comment_id, &user_id)
        .await
        .map_err(internal_error)?;
    Ok(Json(MutationResponse { affected }))
}
