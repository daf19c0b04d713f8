/// Hard per-document size ceiling enforced by the backend (1 MiB).
pub const MAX_DOCUMENT_BYTES: usize = 1_048_576;

/// Practical character budget for a single document's image payload,
/// leaving headroom under `MAX_DOCUMENT_BYTES` for the remaining fields.
pub const DOC_CHAR_BUDGET: usize = 700_000;

/// Maximum accepted picture upload size in bytes (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Maximum post caption length in characters.
pub const MAX_CAPTION_CHARS: usize = 500;

/// Maximum comment length in characters.
pub const MAX_COMMENT_CHARS: usize = 500;

/// Maximum profile bio length in characters.
pub const MAX_BIO_CHARS: usize = 150;

/// Maximum display name length in characters.
pub const MAX_DISPLAY_NAME_CHARS: usize = 30;

/// Minimum password length accepted at sign-up.
pub const MIN_PASSWORD_CHARS: usize = 6;

/// Display name shown for posts and comments without an author name.
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// How many chunked images are resolved concurrently per batch.
pub const RESOLVE_BATCH_SIZE: usize = 3;

/// Pause between image resolution batches, in milliseconds.
pub const RESOLVE_BATCH_PAUSE_MS: u64 = 100;

/// Time budget for the single retry of a failed chunk fetch, in milliseconds.
pub const CHUNK_RETRY_BUDGET_MS: u64 = 5_000;

/// Maximum pixel width of a compressed avatar image.
pub const AVATAR_MAX_WIDTH: u32 = 600;

/// Maximum pixel width of a compressed post image.
pub const POST_MAX_WIDTH: u32 = 1080;

/// Initial JPEG quality for the compression walk (percent).
pub const COMPRESS_INITIAL_QUALITY: u8 = 90;

/// Quality floor below which the compression walk stops (percent).
pub const COMPRESS_MIN_QUALITY: u8 = 10;

/// Quality decrement between compression attempts (percent).
pub const COMPRESS_QUALITY_STEP: u8 = 10;

/// Top-level collection holding post documents.
pub const POSTS_COLLECTION: &str = "posts";

/// Per-post subcollection holding image chunk documents.
pub const IMAGE_CHUNKS_COLLECTION: &str = "imageChunks";

/// Per-post subcollection holding comment documents.
pub const COMMENTS_COLLECTION: &str = "comments";

/// Top-level collection holding user profile documents.
pub const USERS_COLLECTION: &str = "users";
