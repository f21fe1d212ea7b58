use crate::{models::SqlProfile, Db};
use chrono::Utc;

impl Db {
    pub async fn get_profile(&self, user_id: &str) -> anyhow::Result<Option<SqlProfile>> {
        let profile = sqlx::query_as::<_, SqlProfile>(
            r#"
            SELECT user_id, display_name, avatar_url, last_updated_at
            FROM profiles
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    // display fields picked up by every comment read
    pub async fn upsert_profile(
        &self,
        user_id: &str,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> anyhow::Result<()> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, display_name, avatar_url, last_updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                display_name = excluded.display_name,
                avatar_url = excluded.avatar_url,
                last_updated_at = excluded.last_updated_at
            "#,
        )
        .bind(user_id)
        .bind(display_name)
        .bind(avatar_url)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
