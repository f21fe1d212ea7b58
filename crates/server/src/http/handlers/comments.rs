use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::{Comment, CommentPatch, NewComment};
use serde::{Deserialize, Serialize};
use storage::Db;

use super::internal_error;
use crate::{http::auth::CurrentUser, state::AppState};

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub author_id: Option<String>,
    pub parent_id: Option<String>,
    pub body: String,
}

/// Row filter a client adds on top of its session, e.g. `?author_id=u1`.
#[derive(Deserialize)]
pub struct AuthorScope {
    pub author_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct MutationResponse {
    pub affected: u64,
}

pub async fn list_comments(
    State(db): State<Db>,
    Path(post_id): Path<String>,
) -> Result<Json<Vec<Comment>>, (StatusCode, String)> {
    let comments = db.list_comments(&post_id).await.map_err(internal_error)?;
    Ok(Json(comments))
}

pub async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(post_id): Path<String>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), (StatusCode, String)> {
    if let Some(author_id) = payload.author_id.as_deref() {
        if author_id != user_id {
            return Err((
                StatusCode::FORBIDDEN,
                "author_id does not match the session".to_string(),
            ));
        }
    }

    let new = NewComment {
        post_id,
        author_id: user_id,
        parent_id: payload.parent_id,
        body: payload.body,
    };
    let created = state.db.insert_comment(&new).await.map_err(internal_error)?;

    tracing::info!("Comment {} posted on {}", created.id, created.post_id);
    Ok((StatusCode::CREATED, Json(created)))
}

/// Rows outside the session user's own comments are invisible to writes, so
/// a mismatched scope or a foreign comment yields an empty result, not an
/// error.
pub async fn update_comment(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(comment_id): Path<String>,
    Query(scope): Query<AuthorScope>,
    Json(patch): Json<CommentPatch>,
) -> Result<Json<Vec<Comment>>, (StatusCode, String)> {
    if scope.author_id.as_deref().is_some_and(|a| a != user_id) {
        return Ok(Json(Vec::new()));
    }

    let rows = state
        .db
        .update_comment(&comment_id, &user_id, &patch)
        .await
        .map_err(internal_error)?;
    Ok(Json(rows))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(comment_id): Path<String>,
    Query(scope): Query<AuthorScope>,
) -> Result<Json<MutationResponse>, (StatusCode, String)> {
    if scope.author_id.as_deref().is_some_and(|a| a != user_id) {
        return Ok(Json(MutationResponse { affected: 0 }));
    }

    let affected = state
        .db
        .delete_comment(&comment_id, &user_id)
        .await
        .map_err(internal_error)?;

    if affected > 0 {
        tracing::info!("Comment {} deleted by {}", comment_id, user_id);
    }
    Ok(Json(MutationResponse { affected }))
}
