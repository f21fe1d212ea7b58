use axum::http::StatusCode;

pub mod comments;
pub mod likes;
pub mod profile;

fn internal_error(e: anyhow::Error) -> (StatusCode, String) {
    tracing::error!("Store error: {:#}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Server Error".to_string(),
    )
}
