// Shared identifiers, limits, and stored record shapes for the Lumagram crates.

pub mod constants;
pub mod records;
pub mod types;

pub use records::{CommentRecord, ImageChunkRecord, PostRecord, ProfileRecord};
pub use types::{CommentId, Fields, PostId, UserId};
