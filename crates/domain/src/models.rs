use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Author display fields embedded in every fetched comment row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// One row of the comment like join set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentLike {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub parent_id: Option<String>,
    pub body: String,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub author: AuthorProfile,
    #[serde(default)]
    pub likes: Vec<CommentLike>,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    pub fn liked_by(&self, user_id: &str) -> bool {
        self.likes.iter().any(|l| l.user_id == user_id)
    }

    /// Name to render next to the comment; falls back to the raw author id.
    pub fn author_name(&self) -> &str {
        self.author
            .display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.author_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub post_id: String,
    pub author_id: String,
    pub parent_id: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentPatch {
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_helpers() {
        let raw = serde_json::json!({
            "id": "c1",
            "post_id": "p1",
            "author_id": "u1",
            "parent_id": null,
            "body": "hello",
            "created_at": "2024-05-01T10:00:00",
            "updated_at": null,
            "likes": [{ "user_id": "u2" }, { "user_id": "u3" }]
        });
        let c: Comment = serde_json::from_value(raw).unwrap();

        assert!(c.is_root());
        assert_eq!(c.like_count(), 2);
        assert!(c.liked_by("u2"));
        assert!(!c.liked_by("u1"));
        // no profile embedded, falls back to id
        assert_eq!(c.author_name(), "u1");
    }
}
