//! # lumagram-feed
//!
//! Live feed synchronization.  A subscription mirrors the backend's
//! newest-first post query into rendered snapshots: the first snapshot
//! arrives fast with placeholders standing in for chunked pictures, then
//! patched snapshots follow as those pictures resolve in the background.

pub mod comments;
pub mod synchronizer;
pub mod view;

mod error;
mod resolver;

pub use comments::{CommentEvent, CommentSubscription};
pub use error::FeedError;
pub use synchronizer::{FeedConfig, FeedEvent, FeedSnapshot, FeedSubscription, FeedSynchronizer};
pub use view::{CommentView, ImageState, PostView};
