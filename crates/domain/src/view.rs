use serde::{Deserialize, Serialize};

/// What the UI is doing with a single comment.
///
/// Likes are not represented: the liked/unliked flag is read straight from the
/// cached like rows and has no pending state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CommentView {
    #[default]
    Viewing,
    Editing {
        draft: String,
    },
    PendingReply {
        draft: String,
    },
}

impl CommentView {
    pub fn begin_edit(current_body: &str) -> Self {
        CommentView::Editing {
            draft: current_body.to_string(),
        }
    }

    pub fn begin_reply() -> Self {
        CommentView::PendingReply {
            draft: String::new(),
        }
    }

    pub fn is_editing(&self) -> bool {
        matches!(self, CommentView::Editing { .. })
    }

    pub fn is_replying(&self) -> bool {
        matches!(self, CommentView::PendingReply { .. })
    }

    pub fn draft(&self) -> Option<&str> {
        match self {
            CommentView::Viewing => None,
            CommentView::Editing { draft } | CommentView::PendingReply { draft } => Some(draft),
        }
    }

    /// Replaces the draft text; ignored while just viewing.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        match self {
            CommentView::Viewing => {}
            CommentView::Editing { draft } | CommentView::PendingReply { draft } => {
                *draft = text.into()
            }
        }
    }
}
