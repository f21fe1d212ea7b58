use std::collections::HashMap;

use chrono::Utc;
use domain::{Comment, CommentLike, CommentPatch, NewComment};

use crate::{
    models::{SqlComment, SqlLike},
    Db,
};

const SELECT_COMMENT: &str = r#"
    SELECT
        c.id,
        c.post_id,
        c.author_id,
        c.parent_id,
        c.body,
        c.created_at,
        c.updated_at,
        p.display_name,
        p.avatar_url
    FROM comments c
    LEFT JOIN profiles p ON p.user_id = c.author_id
"#;

impl Db {
    /// All comments of a post, oldest first, with author fields and like rows.
    pub async fn list_comments(&self, post_id: &str) -> anyhow::Result<Vec<Comment>> {
        let rows = sqlx::query_as::<_, SqlComment>(&format!(
            "{} WHERE c.post_id = ? ORDER BY c.created_at ASC, c.rowid ASC",
            SELECT_COMMENT
        ))
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        let like_rows = sqlx::query_as::<_, SqlLike>(
            r#"
            SELECT l.comment_id, l.user_id
            FROM comment_likes l
            JOIN comments c ON c.id = l.comment_id
            WHERE c.post_id = ?
            ORDER BY l.created_at ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        let mut likes: HashMap<String, Vec<CommentLike>> = HashMap::new();
        for row in like_rows {
            likes.entry(row.comment_id.clone()).or_default().push(row.into());
        }

        let comments = rows
            .into_iter()
            .map(|row| {
                let mut comment: Comment = row.into();
                comment.likes = likes.remove(&comment.id).unwrap_or_default();
                comment
            })
            .collect();
        Ok(comments)
    }

    pub async fn get_comment(&self, comment_id: &str) -> anyhow::Result<Option<Comment>> {
        let row = sqlx::query_as::<_, SqlComment>(&format!("{} WHERE c.id = ?", SELECT_COMMENT))
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let likes = sqlx::query_as::<_, SqlLike>(
            "SELECT comment_id, user_id FROM comment_likes WHERE comment_id = ? ORDER BY created_at ASC",
        )
        .bind(comment_id)
        .fetch_all(&self.pool)
        .await?;

        let mut comment: Comment = row.into();
        comment.likes = likes.into_iter().map(Into::into).collect();
        Ok(Some(comment))
    }

    pub async fn insert_comment(&self, new: &NewComment) -> anyhow::Result<Comment> {
        let id = format!("{:x}", rand::random::<u128>());
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO comments (id, post_id, author_id, parent_id, body, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&new.post_id)
        .bind(&new.author_id)
        .bind(&new.parent_id)
        .bind(&new.body)
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Comment {} inserted on post {}", id, new.post_id);

        self.get_comment(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Comment {} vanished right after insert", id))
    }

    /// Rewrites the body of a comment owned by `author_id`.
    ///
    /// Returns the affected rows: empty when the id does not exist or belongs to
    /// someone else. The two cases are not told apart.
    pub async fn update_comment(
        &self,
        comment_id: &str,
        author_id: &str,
        patch: &CommentPatch,
    ) -> anyhow::Result<Vec<Comment>> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE comments
            SET body = ?, updated_at = ?
            WHERE id = ? AND author_id = ?
            "#,
        )
        .bind(&patch.body)
        .bind(now)
        .bind(comment_id)
        .bind(author_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!("Update of {} by {} matched no rows", comment_id, author_id);
            return Ok(Vec::new());
        }

        Ok(self.get_comment(comment_id).await?.into_iter().collect())
    }

    /// Hard-deletes a comment owned by `author_id` together with its like rows.
    /// Replies stay where they are.
    pub async fn delete_comment(&self, comment_id: &str, author_id: &str) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;

        let affected = sqlx::query("DELETE FROM comments WHERE id = ? AND author_id = ?")
            .bind(comment_id)
            .bind(author_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if affected > 0 {
            sqlx::query("DELETE FROM comment_likes WHERE comment_id = ?")
                .bind(comment_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(affected)
    }
}
