mod backends;
mod coordinator;
mod traits;

pub use backends::RestBackend;
pub use coordinator::{ActionKey, MutationCoordinator, Outcome};
pub use traits::{CommentBackend, Confirm};
