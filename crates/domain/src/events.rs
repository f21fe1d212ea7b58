use serde::{Deserialize, Serialize};

/// Transient, user-facing notification raised by a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Notice {
    Success(String),
    Error(String),
    /// The action needs a signed-in user; show the sign-in call to action.
    AuthRequired,
    ThreadRefreshed { post_id: String },
}
