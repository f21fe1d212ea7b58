mod commands;
mod events;
mod models;
pub mod session;
pub mod thread;
mod view;

pub use commands::CommentCommand;
pub use events::Notice;
pub use models::{AuthorProfile, Comment, CommentLike, CommentPatch, NewComment};
pub use session::{TokenError, Viewer};
pub use thread::{build_thread, CommentNode};
pub use view::CommentView;
