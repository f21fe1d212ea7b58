use axum::extract::FromRef;
use std::sync::Arc;
use storage::Db;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub session_secret: Arc<str>,
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
