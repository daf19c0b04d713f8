use thiserror::Error;

use lumagram_media::CompressError;
use lumagram_shared::PostId;
use lumagram_store::StoreError;

use crate::auth::AuthError;

/// Input problems caught synchronously, before any I/O.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Caption must not be empty")]
    EmptyCaption,

    #[error("Caption is too long: {chars} characters (limit {limit})")]
    CaptionTooLong { chars: usize, limit: usize },

    #[error("Comment must not be empty")]
    EmptyComment,

    #[error("Comment is too long: {chars} characters (limit {limit})")]
    CommentTooLong { chars: usize, limit: usize },

    #[error("Upload contains no image data")]
    EmptyImage,

    #[error("Image is too large: {bytes} bytes (limit {limit})")]
    ImageTooLarge { bytes: usize, limit: usize },

    #[error("Not a supported image format (want PNG, JPEG or WebP): {content_type}")]
    UnsupportedImage { content_type: String },

    #[error("Display name must not be empty")]
    EmptyDisplayName,

    #[error("Display name is too long: {chars} characters (limit {limit})")]
    DisplayNameTooLong { chars: usize, limit: usize },

    #[error("Bio is too long: {chars} characters (limit {limit})")]
    BioTooLong { chars: usize, limit: usize },
}

/// Errors surfaced by client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The caller tried to touch another account's data.  Nothing was
    /// written.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Post not found: {0}")]
    PostNotFound(PostId),

    /// An avatar must always fit a single profile document; there is no
    /// chunked fallback for profiles.
    #[error("Avatar rendering does not fit a profile document: {chars} characters (limit {limit})")]
    AvatarTooLarge { chars: usize, limit: usize },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Media(#[from] CompressError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
