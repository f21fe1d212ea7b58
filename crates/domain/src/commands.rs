#[derive(Debug, Clone)]
pub enum CommentCommand {
    Create {
        post_id: String,
        parent_id: Option<String>,
        body: String,
    },
    Edit {
        post_id: String,
        comment_id: String,
        body: String,
    },
    Delete {
        post_id: String,
        comment_id: String,
    },
    ToggleLike {
        post_id: String,
        comment_id: String,
    },
}

impl CommentCommand {
    pub fn post_id(&self) -> &str {
        match self {
            CommentCommand::Create { post_id, .. }
            | CommentCommand::Edit { post_id, .. }
            | CommentCommand::Delete { post_id, .. }
            | CommentCommand::ToggleLike { post_id, .. } => post_id,
        }
    }
}
