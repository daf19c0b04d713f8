//! Rendered views handed to the app layer.
//!
//! Raw documents are normalized here, with the same defaults the original
//! web client applied: anonymous author, initial-letter avatar, empty
//! caption and likes, and "now" for posts whose server timestamp has not
//! landed yet.

use chrono::{DateTime, Utc};
use serde::Serialize;

use lumagram_media::placeholder;
use lumagram_shared::constants::ANONYMOUS_NAME;
use lumagram_shared::{CommentId, CommentRecord, PostId, PostRecord, UserId};

/// What the feed currently shows for a post's picture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageState {
    /// The picture is available inline.
    Ready { uri: String },
    /// The picture is chunked and still resolving; `uri` is the
    /// deterministic placeholder for this post.
    Loading { uri: String },
    /// Chunk resolution failed; `uri` is a fallback placeholder.
    Failed { uri: String },
}

impl ImageState {
    /// Whatever the app should render right now.
    pub fn uri(&self) -> &str {
        match self {
            Self::Ready { uri } | Self::Loading { uri } | Self::Failed { uri } => uri,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// One post as the app renders it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: PostId,
    /// Account id of the author, when the document carries one.
    pub user_id: Option<UserId>,
    pub username: String,
    pub avatar: String,
    pub caption: String,
    pub image: ImageState,
    pub likes: Vec<UserId>,
    pub created_at: DateTime<Utc>,
}

impl PostView {
    /// Normalizes a raw post document into its rendered view.
    ///
    /// `now` stands in for a missing timestamp, so freshly written posts
    /// whose server time has not resolved yet still sort and render.
    pub fn from_record(id: PostId, record: &PostRecord, now: DateTime<Utc>) -> Self {
        let username = record
            .username
            .clone()
            .unwrap_or_else(|| ANONYMOUS_NAME.to_owned());
        let avatar = record
            .avatar
            .clone()
            .unwrap_or_else(|| placeholder::avatar_placeholder(&username));
        let image = match (&record.image, record.is_chunked()) {
            (Some(uri), _) => ImageState::Ready { uri: uri.clone() },
            (None, true) => ImageState::Loading {
                uri: placeholder::post_placeholder(&id),
            },
            // A post with no picture at all still renders something stable.
            (None, false) => ImageState::Ready {
                uri: placeholder::post_placeholder(&id),
            },
        };

        Self {
            id,
            user_id: record.user_id.clone(),
            username,
            avatar,
            caption: record.caption.clone().unwrap_or_default(),
            image,
            likes: record.likes.clone(),
            created_at: record.created_at.unwrap_or(now),
        }
    }

    /// The same post with its picture replaced.
    pub fn with_image(&self, image: ImageState) -> Self {
        Self {
            image,
            ..self.clone()
        }
    }

    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    pub fn liked_by(&self, user: &UserId) -> bool {
        self.likes.contains(user)
    }
}

/// One comment as the app renders it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: CommentId,
    pub user_id: Option<UserId>,
    pub username: String,
    pub avatar: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl CommentView {
    pub fn from_record(id: CommentId, record: &CommentRecord, now: DateTime<Utc>) -> Self {
        let username = record
            .username
            .clone()
            .unwrap_or_else(|| ANONYMOUS_NAME.to_owned());
        let avatar = record
            .avatar
            .clone()
            .unwrap_or_else(|| placeholder::avatar_placeholder(&username));
        Self {
            id,
            user_id: record.user_id.clone(),
            username,
            avatar,
            text: record.text.clone().unwrap_or_default(),
            created_at: record.created_at.unwrap_or(now),
        }
    }
}
