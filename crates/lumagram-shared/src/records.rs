//! Stored document shapes and their field-map conversions.
//!
//! Documents written by earlier revisions of the web client can miss fields
//! or carry them with the wrong type, so every `from_fields` here is lenient:
//! unusable fields fall back to their defaults instead of failing the read.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{json, Value};

use crate::types::{Fields, PostId, UserId};

/// Fixed-precision RFC 3339 rendering, so string order matches time order.
pub fn rfc3339_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

/// A feed post document.
///
/// The picture lives either inline in `image` or, when it would push the
/// document over the backend size ceiling, in `imageChunks` child documents
/// announced by `imageChunkCount`.  A materialized post has exactly one of
/// the two; a post with neither is still rendered, with a placeholder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostRecord {
    /// Account id of the author.
    pub user_id: Option<UserId>,
    /// Author display name as captured at post time.
    pub username: Option<String>,
    /// Author avatar as captured at post time (URL or data URI).
    pub avatar: Option<String>,
    /// Inline image payload, when it fits in a single document.
    pub image: Option<String>,
    /// Number of chunk child documents; zero means the image is inline.
    pub image_chunk_count: u32,
    /// Post caption.
    pub caption: Option<String>,
    /// Account ids that liked the post.
    pub likes: Vec<UserId>,
    /// When the post was created.
    pub created_at: Option<DateTime<Utc>>,
}

impl PostRecord {
    pub fn from_fields(fields: &Fields) -> Self {
        Self {
            user_id: str_field(fields, "userId").map(UserId),
            username: str_field(fields, "username"),
            avatar: str_field(fields, "avatar"),
            image: str_field(fields, "image"),
            image_chunk_count: u32_field(fields, "imageChunkCount").unwrap_or(0),
            caption: str_field(fields, "caption"),
            likes: id_list_field(fields, "likes"),
            created_at: time_field(fields),
        }
    }

    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        put(&mut fields, "userId", json!(self.user_id));
        put(&mut fields, "username", json!(self.username));
        put(&mut fields, "avatar", json!(self.avatar));
        put(&mut fields, "image", json!(self.image));
        if self.image_chunk_count > 0 {
            put(&mut fields, "imageChunkCount", json!(self.image_chunk_count));
        }
        put(&mut fields, "caption", json!(self.caption));
        put(&mut fields, "likes", json!(self.likes));
        put_times(&mut fields, self.created_at);
        fields
    }

    /// Whether the image lives in chunk child documents.
    pub fn is_chunked(&self) -> bool {
        self.image_chunk_count > 0
    }
}

// ---------------------------------------------------------------------------
// Image chunk
// ---------------------------------------------------------------------------

/// One segment of a chunked image payload.
///
/// The chunk's document id is its index rendered in decimal, but assembly
/// trusts the `index` field, not the id.  `parentPostId` and `totalChunks`
/// are denormalized for diagnostics and cleanup jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageChunkRecord {
    /// Post this segment belongs to.
    pub parent_post_id: Option<PostId>,
    /// Zero-based position of this segment.
    pub index: u32,
    /// Raw character segment of the encoded image.
    pub data: String,
    /// Size of the full chunk set this segment is part of.
    pub total_chunks: u32,
}

impl ImageChunkRecord {
    pub fn from_fields(fields: &Fields) -> Self {
        Self {
            parent_post_id: str_field(fields, "parentPostId").map(PostId),
            index: u32_field(fields, "index").unwrap_or(0),
            data: str_field(fields, "data").unwrap_or_default(),
            total_chunks: u32_field(fields, "totalChunks").unwrap_or(0),
        }
    }

    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        put(&mut fields, "parentPostId", json!(self.parent_post_id));
        put(&mut fields, "index", json!(self.index));
        put(&mut fields, "data", json!(self.data));
        put(&mut fields, "totalChunks", json!(self.total_chunks));
        fields
    }
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

/// A comment document under a post's comment subcollection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentRecord {
    /// Account id of the commenter.
    pub user_id: Option<UserId>,
    /// Commenter display name as captured at comment time.
    pub username: Option<String>,
    /// Commenter avatar as captured at comment time.
    pub avatar: Option<String>,
    /// Comment body.
    pub text: Option<String>,
    /// When the comment was created.
    pub created_at: Option<DateTime<Utc>>,
}

impl CommentRecord {
    pub fn from_fields(fields: &Fields) -> Self {
        Self {
            user_id: str_field(fields, "userId").map(UserId),
            username: str_field(fields, "username"),
            avatar: str_field(fields, "userAvatar"),
            text: str_field(fields, "text"),
            created_at: time_field(fields),
        }
    }

    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        put(&mut fields, "userId", json!(self.user_id));
        put(&mut fields, "username", json!(self.username));
        put(&mut fields, "userAvatar", json!(self.avatar));
        put(&mut fields, "text", json!(self.text));
        put_times(&mut fields, self.created_at);
        fields
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// A user profile document, keyed by the account id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileRecord {
    /// Sign-in email.
    pub email: Option<String>,
    /// Chosen display name.
    pub display_name: Option<String>,
    /// Short free-form bio.
    pub bio: Option<String>,
    /// Avatar image (URL or data URI).
    pub photo_url: Option<String>,
    /// Follower count.
    pub followers: u32,
    /// Followed-account count.
    pub following: u32,
    /// When the profile was created.
    pub created_at: Option<DateTime<Utc>>,
}

impl ProfileRecord {
    pub fn from_fields(fields: &Fields) -> Self {
        Self {
            email: str_field(fields, "email"),
            display_name: str_field(fields, "displayName"),
            bio: str_field(fields, "bio"),
            photo_url: str_field(fields, "photoURL"),
            followers: u32_field(fields, "followers").unwrap_or(0),
            following: u32_field(fields, "following").unwrap_or(0),
            created_at: time_field(fields),
        }
    }

    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        put(&mut fields, "email", json!(self.email));
        put(&mut fields, "displayName", json!(self.display_name));
        put(&mut fields, "bio", json!(self.bio));
        put(&mut fields, "photoURL", json!(self.photo_url));
        fields.insert("followers".to_owned(), json!(self.followers));
        fields.insert("following".to_owned(), json!(self.following));
        put_times(&mut fields, self.created_at);
        fields
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn put(fields: &mut Fields, key: &str, value: Value) {
    if !value.is_null() {
        fields.insert(key.to_owned(), value);
    }
}

/// Writes both timestamp renderings: `createdAt` as a fixed-precision
/// RFC 3339 string (the ordering key) and `timestamp` as epoch milliseconds.
fn put_times(fields: &mut Fields, at: Option<DateTime<Utc>>) {
    if let Some(at) = at {
        fields.insert("createdAt".to_owned(), json!(rfc3339_millis(at)));
        fields.insert("timestamp".to_owned(), json!(at.timestamp_millis()));
    }
}

fn str_field(fields: &Fields, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn u32_field(fields: &Fields, key: &str) -> Option<u32> {
    fields
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

fn id_list_field(fields: &Fields, key: &str) -> Vec<UserId> {
    fields
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(UserId::from)
                .collect()
        })
        .unwrap_or_default()
}

fn time_field(fields: &Fields) -> Option<DateTime<Utc>> {
    if let Some(raw) = fields.get("createdAt").and_then(Value::as_str) {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    fields
        .get("timestamp")
        .and_then(Value::as_i64)
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 17, 12, 30, 45).single().unwrap()
    }

    #[test]
    fn post_round_trips_through_fields() {
        let record = PostRecord {
            user_id: Some(UserId::from("user-1")),
            username: Some("ines".to_owned()),
            avatar: Some("https://cdn.example/a.png".to_owned()),
            image: Some("data:image/jpeg;base64,AAAA".to_owned()),
            image_chunk_count: 0,
            caption: Some("first light".to_owned()),
            likes: vec![UserId::from("user-2")],
            created_at: Some(sample_time()),
        };

        let fields = record.to_fields();
        assert_eq!(PostRecord::from_fields(&fields), record);
        assert!(!fields.contains_key("imageChunkCount"));
    }

    #[test]
    fn chunked_post_writes_marker_field() {
        let record = PostRecord {
            image_chunk_count: 3,
            ..PostRecord::default()
        };

        let fields = record.to_fields();
        assert_eq!(fields["imageChunkCount"], json!(3));
        assert!(!fields.contains_key("image"));
        assert!(record.is_chunked());
        assert!(!PostRecord::default().is_chunked());
    }

    #[test]
    fn empty_document_reads_as_defaults() {
        let record = PostRecord::from_fields(&Fields::new());
        assert_eq!(record, PostRecord::default());
    }

    #[test]
    fn mistyped_fields_fall_back_to_defaults() {
        let mut fields = Fields::new();
        fields.insert("likes".to_owned(), json!("not-a-list"));
        fields.insert("imageChunkCount".to_owned(), json!(-4));
        fields.insert("username".to_owned(), json!(17));

        let record = PostRecord::from_fields(&fields);
        assert!(record.likes.is_empty());
        assert_eq!(record.image_chunk_count, 0);
        assert_eq!(record.username, None);
    }

    #[test]
    fn timestamp_millis_backfills_missing_created_at() {
        let at = sample_time();
        let mut fields = Fields::new();
        fields.insert("timestamp".to_owned(), json!(at.timestamp_millis()));

        let record = PostRecord::from_fields(&fields);
        assert_eq!(record.created_at, Some(at));
    }

    #[test]
    fn created_at_strings_order_like_their_times() {
        let early = sample_time();
        let late = early + chrono::Duration::milliseconds(250);
        // The whole point of the fixed-precision rendering: plain string
        // comparison must agree with time comparison, subseconds included.
        assert!(rfc3339_millis(early) < rfc3339_millis(late));
        let whole_second = early + chrono::Duration::seconds(1);
        assert!(rfc3339_millis(late) < rfc3339_millis(whole_second));
    }

    #[test]
    fn profile_round_trips_through_fields() {
        let record = ProfileRecord {
            email: Some("ines@example.com".to_owned()),
            display_name: Some("ines".to_owned()),
            bio: Some("shooting film since 2019".to_owned()),
            photo_url: Some("https://cdn.example/a.png".to_owned()),
            followers: 12,
            following: 7,
            created_at: Some(sample_time()),
        };

        assert_eq!(ProfileRecord::from_fields(&record.to_fields()), record);
    }

    #[test]
    fn fresh_profile_writes_zero_counts() {
        let fields = ProfileRecord::default().to_fields();
        assert_eq!(fields["followers"], json!(0));
        assert_eq!(fields["following"], json!(0));
    }

    #[test]
    fn comment_uses_the_denormalized_author_keys() {
        let record = CommentRecord {
            user_id: Some(UserId::from("user-1")),
            username: Some("ines".to_owned()),
            avatar: Some("data:image/svg+xml;base64,AA==".to_owned()),
            text: Some("lovely".to_owned()),
            created_at: Some(sample_time()),
        };

        let fields = record.to_fields();
        assert_eq!(fields["userId"], json!("user-1"));
        assert_eq!(fields["userAvatar"], json!("data:image/svg+xml;base64,AA=="));
        assert_eq!(CommentRecord::from_fields(&fields), record);
    }

    #[test]
    fn chunk_record_round_trips_through_fields() {
        let record = ImageChunkRecord {
            parent_post_id: Some(PostId::from("p1")),
            index: 2,
            data: "QUJD".to_owned(),
            total_chunks: 3,
        };
        assert_eq!(ImageChunkRecord::from_fields(&record.to_fields()), record);
    }
}
