use chrono::NaiveDateTime;
use domain::{AuthorProfile, Comment, CommentLike};
use sqlx::FromRow;

#[derive(FromRow)]
pub struct SqlComment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub parent_id: Option<String>,
    pub body: String,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,

    // joined from profiles
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<SqlComment> for Comment {
    fn from(sql: SqlComment) -> Self {
        Comment {
            id: sql.id,
            post_id: sql.post_id,
            author_id: sql.author_id,
            parent_id: sql.parent_id,
            body: sql.body,
            created_at: sql.created_at,
            updated_at: sql.updated_at,
            author: AuthorProfile {
                display_name: sql.display_name,
                avatar_url: sql.avatar_url,
            },
            likes: Vec::new(),
        }
    }
}

#[derive(FromRow)]
pub struct SqlLike {
    pub comment_id: String,
    pub user_id: String,
}

impl From<SqlLike> for CommentLike {
    fn from(sql: SqlLike) -> Self {
        CommentLike {
            user_id: sql.user_id,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SqlProfile {
    pub user_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub last_updated_at: NaiveDateTime,
}
