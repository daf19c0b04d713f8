//! Commenting on posts.

use chrono::Utc;
use tracing::info;

use lumagram_shared::constants::{COMMENTS_COLLECTION, MAX_COMMENT_CHARS};
use lumagram_shared::{CommentId, CommentRecord, PostId};

use crate::error::{ClientError, Result, ValidationError};
use crate::{posts_root, Client};

impl Client {
    /// Adds a comment under a post, returning the new comment's id.
    ///
    /// The author's name and avatar are denormalized onto the comment at
    /// write time, the same way posts carry theirs.
    pub async fn add_comment(&self, post: &PostId, text: &str) -> Result<CommentId> {
        let user = self.require_user().await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyComment.into());
        }
        let chars = text.chars().count();
        if chars > MAX_COMMENT_CHARS {
            return Err(ValidationError::CommentTooLong {
                chars,
                limit: MAX_COMMENT_CHARS,
            }
            .into());
        }

        let post_doc = posts_root().doc(post.as_str());
        if self.store.get(&post_doc).await?.is_none() {
            return Err(ClientError::PostNotFound(post.clone()));
        }

        let (username, avatar) = self.author_identity(&user).await;
        let record = CommentRecord {
            user_id: Some(user.uid),
            username: Some(username),
            avatar: Some(avatar),
            text: Some(text.to_owned()),
            created_at: Some(Utc::now()),
        };

        let id = CommentId::from(self.store.new_id());
        let doc = post_doc.collection(COMMENTS_COLLECTION).doc(id.as_str());
        self.store.set(&doc, record.to_fields()).await?;
        info!(post = %post, comment = %id, "comment added");
        Ok(id)
    }
}
