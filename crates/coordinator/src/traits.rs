use anyhow::Result;
use async_trait::async_trait;
use domain::{Comment, CommentPatch, NewComment};

/// The tabular backend the coordinator writes through.
///
/// Writes on existing comments carry the caller's id so the row can be
/// scoped to its author; a scoped-out write affects zero rows instead of
/// failing.
#[async_trait]
pub trait CommentBackend: Send + Sync {
    /// Comments of one post, ascending by `created_at`, with author fields and
    /// like rows embedded.
    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<Comment>>;

    async fn create_comment(&self, new: NewComment) -> Result<Comment>;

    /// Returns the updated rows, empty when nothing matched `id AND author_id`.
    async fn update_comment(
        &self,
        comment_id: &str,
        author_id: &str,
        patch: CommentPatch,
    ) -> Result<Vec<Comment>>;

    async fn delete_comment(&self, comment_id: &str, author_id: &str) -> Result<u64>;

    async fn like_comment(&self, comment_id: &str, user_id: &str) -> Result<u64>;

    async fn unlike_comment(&self, comment_id: &str, user_id: &str) -> Result<u64>;
}

/// Blocking yes/no prompt shown before destructive actions.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}

#[async_trait]
impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    async fn confirm(&self, message: &str) -> bool {
        self(message)
    }
}
