use anyhow::Result;
use async_trait::async_trait;
use domain::{Comment, CommentPatch, NewComment};
use storage::Db;

use crate::traits::CommentBackend;

#[async_trait]
impl CommentBackend for Db {
    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<Comment>> {
        self.list_comments(post_id).await
    }

    async fn create_comment(&self, new: NewComment) -> Result<Comment> {
        self.insert_comment(&new).await
    }

    async fn update_comment(
        &self,
        comment_id: &str,
        author_id: &str,
        patch: CommentPatch,
    ) -> Result<Vec<Comment>> {
        Db::update_comment(self, comment_id, author_id, &patch).await
    }

    async fn delete_comment(&self, comment_id: &str, author_id: &str) -> Result<u64> {
        Db::delete_comment(self, comment_id, author_id).await
    }

    async fn like_comment(&self, comment_id: &str, user_id: &str) -> Result<u64> {
        self.insert_like(comment_id, user_id).await
    }

    async fn unlike_comment(&self, comment_id: &str, user_id: &str) -> Result<u64> {
        self.delete_like(comment_id, user_id).await
    }
}
