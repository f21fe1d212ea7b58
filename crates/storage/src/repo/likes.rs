use chrono::Utc;

use crate::Db;

impl Db {
    /// Adds a like row. Returns 0 when the comment does not exist; a second like
    /// by the same user fails with a unique violation.
    pub async fn insert_like(&self, comment_id: &str, user_id: &str) -> anyhow::Result<u64> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            INSERT INTO comment_likes (comment_id, user_id, created_at)
            SELECT ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM comments WHERE id = ?)
            "#,
        )
        .bind(comment_id)
        .bind(user_id)
        .bind(now)
        .bind(comment_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_like(&self, comment_id: &str, user_id: &str) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM comment_likes WHERE comment_id = ? AND user_id = ?")
            .bind(comment_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
