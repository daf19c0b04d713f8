//! Post creation, deletion, and likes.

use chrono::Utc;
use serde_json::json;
use tracing::info;

use lumagram_media::{compress_to_data_uri, split_into_chunks, ImageUpload};
use lumagram_shared::constants::{
    COMMENTS_COLLECTION, IMAGE_CHUNKS_COLLECTION, MAX_CAPTION_CHARS, MAX_UPLOAD_BYTES,
};
use lumagram_shared::{ImageChunkRecord, PostId, PostRecord};
use lumagram_store::{Query, StoreError, WriteBatch};

use crate::error::{ClientError, Result, ValidationError};
use crate::{posts_root, Client};

impl Client {
    /// Validates, compresses, and stores a new post, returning its id.
    ///
    /// The write is a single atomic batch: the post document plus, when the
    /// compressed picture exceeds one document's character budget, its chunk
    /// child documents.  Either everything lands or nothing does.
    pub async fn create_post(&self, upload: &ImageUpload, caption: &str) -> Result<PostId> {
        let user = self.require_user().await?;
        let caption = validate_caption(caption)?;
        validate_upload(upload)?;

        let image = compress_to_data_uri(&upload.bytes, &self.options.post_profile)?;
        let (username, avatar) = self.author_identity(&user).await;

        let id = PostId::from(self.store.new_id());
        let record = PostRecord {
            user_id: Some(user.uid.clone()),
            username: Some(username),
            avatar: Some(avatar),
            caption: Some(caption),
            created_at: Some(Utc::now()),
            ..PostRecord::default()
        };

        let (batch, chunks) = build_post_batch(&id, record, &image, self.options.chunk_budget);
        self.store.commit(batch).await?;
        info!(post = %id, chunks, "post created");
        Ok(id)
    }

    /// Deletes a post the caller owns, together with its chunks and
    /// comments, in one atomic batch.  Non-owners get `Forbidden` and no
    /// write happens.
    pub async fn delete_post(&self, post: &PostId) -> Result<()> {
        let user = self.require_user().await?;

        let post_doc = posts_root().doc(post.as_str());
        let found = self
            .store
            .get(&post_doc)
            .await?
            .ok_or_else(|| ClientError::PostNotFound(post.clone()))?;
        let record = PostRecord::from_fields(&found.fields);
        if record.user_id.as_ref() != Some(&user.uid) {
            return Err(ClientError::Forbidden(format!(
                "post {post} belongs to another account"
            )));
        }

        let chunks = self
            .store
            .run_query(&Query::collection(
                post_doc.collection(IMAGE_CHUNKS_COLLECTION),
            ))
            .await?;
        let comments = self
            .store
            .run_query(&Query::collection(post_doc.collection(COMMENTS_COLLECTION)))
            .await?;

        let mut batch = WriteBatch::new();
        for doc in &chunks {
            batch.delete(doc.doc_ref.clone());
        }
        for doc in &comments {
            batch.delete(doc.doc_ref.clone());
        }
        batch.delete(post_doc);
        self.store.commit(batch).await?;
        info!(
            post = %post,
            chunks = chunks.len(),
            comments = comments.len(),
            "post deleted"
        );
        Ok(())
    }

    /// Adds the caller to the post's likes.  Liking twice is a no-op.
    pub async fn like_post(&self, post: &PostId) -> Result<()> {
        let user = self.require_user().await?;
        let mut batch = WriteBatch::new();
        batch.array_union(posts_root().doc(post.as_str()), "likes", vec![json!(user.uid)]);
        self.commit_like(post, batch).await
    }

    /// Removes the caller from the post's likes.  Unliking a post the
    /// caller never liked is a no-op.
    pub async fn unlike_post(&self, post: &PostId) -> Result<()> {
        let user = self.require_user().await?;
        let mut batch = WriteBatch::new();
        batch.array_remove(posts_root().doc(post.as_str()), "likes", vec![json!(user.uid)]);
        self.commit_like(post, batch).await
    }

    async fn commit_like(&self, post: &PostId, batch: WriteBatch) -> Result<()> {
        self.store.commit(batch).await.map_err(|err| match err {
            StoreError::NotFound(_) => ClientError::PostNotFound(post.clone()),
            other => other.into(),
        })
    }
}

fn validate_caption(caption: &str) -> Result<String> {
    let caption = caption.trim();
    if caption.is_empty() {
        return Err(ValidationError::EmptyCaption.into());
    }
    let chars = caption.chars().count();
    if chars > MAX_CAPTION_CHARS {
        return Err(ValidationError::CaptionTooLong {
            chars,
            limit: MAX_CAPTION_CHARS,
        }
        .into());
    }
    Ok(caption.to_owned())
}

pub(crate) fn validate_upload(upload: &ImageUpload) -> Result<()> {
    if upload.is_empty() {
        return Err(ValidationError::EmptyImage.into());
    }
    if upload.len() > MAX_UPLOAD_BYTES {
        return Err(ValidationError::ImageTooLarge {
            bytes: upload.len(),
            limit: MAX_UPLOAD_BYTES,
        }
        .into());
    }
    if !upload.is_permitted_type() || upload.sniffed_format().is_none() {
        return Err(ValidationError::UnsupportedImage {
            content_type: upload.content_type.clone(),
        }
        .into());
    }
    Ok(())
}

/// Lays out the atomic write for a new post: the image inline when it fits
/// the budget, chunk child documents otherwise.  Returns the batch and the
/// number of chunks it carries.
fn build_post_batch(
    id: &PostId,
    mut record: PostRecord,
    image: &str,
    chunk_budget: usize,
) -> (WriteBatch, usize) {
    let post_doc = posts_root().doc(id.as_str());
    let mut batch = WriteBatch::new();

    if image.len() <= chunk_budget {
        record.image = Some(image.to_owned());
        batch.set(post_doc, record.to_fields());
        return (batch, 0);
    }

    let chunks = split_into_chunks(image, chunk_budget);
    let total = chunks.len();
    record.image_chunk_count = total as u32;
    batch.set(post_doc.clone(), record.to_fields());

    let chunks_ref = post_doc.collection(IMAGE_CHUNKS_COLLECTION);
    for chunk in chunks {
        let doc = chunks_ref.doc(&chunk.index.to_string());
        let child = ImageChunkRecord {
            parent_post_id: Some(id.clone()),
            index: chunk.index as u32,
            data: chunk.data,
            total_chunks: total as u32,
        };
        batch.set(doc, child.to_fields());
    }
    (batch, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryAuthProvider, SharedAuth};
    use crate::ClientOptions;
    use image::{ImageBuffer, Rgb};
    use lumagram_feed::FeedEvent;
    use lumagram_shared::UserId;
    use lumagram_store::{DocumentStore, MemoryStore, SharedStore};
    use std::io::Cursor;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 255) as u8, (y % 255) as u8, 96])
        });
        let mut buf = Vec::new();
        let mut cursor = Cursor::new(&mut buf);
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        buf
    }

    fn picture() -> ImageUpload {
        ImageUpload::new(png_bytes(64, 64), "image/png")
    }

    async fn client_with_options(options: ClientOptions) -> (MemoryStore, Client) {
        let memory = MemoryStore::new();
        let store: SharedStore = Arc::new(memory.clone());
        let auth: SharedAuth = Arc::new(MemoryAuthProvider::new());
        let client = Client::with_options(store, auth, options);
        client
            .register("ines@example.com", "secret1", Some("ines"), None)
            .await
            .unwrap();
        (memory, client)
    }

    async fn test_client() -> (MemoryStore, Client) {
        client_with_options(ClientOptions::default()).await
    }

    #[tokio::test]
    async fn test_create_post_stores_inline_image() {
        let (memory, client) = test_client().await;
        let id = client.create_post(&picture(), "first light").await.unwrap();

        let doc = memory
            .get(&posts_root().doc(id.as_str()))
            .await
            .unwrap()
            .unwrap();
        let record = PostRecord::from_fields(&doc.fields);
        assert_eq!(record.caption.as_deref(), Some("first light"));
        assert_eq!(record.username.as_deref(), Some("ines"));
        assert!(record.image.as_ref().unwrap().starts_with("data:image/jpeg;base64,"));
        assert!(!record.is_chunked());
        assert!(record.created_at.is_some());
        assert_eq!(memory.doc_count().await, 2); // profile + post
    }

    #[tokio::test]
    async fn test_create_post_chunks_over_small_budget() {
        let options = ClientOptions {
            chunk_budget: 500,
            ..ClientOptions::default()
        };
        let (memory, client) = client_with_options(options).await;
        let id = client.create_post(&picture(), "gallery").await.unwrap();

        let doc = memory
            .get(&posts_root().doc(id.as_str()))
            .await
            .unwrap()
            .unwrap();
        let record = PostRecord::from_fields(&doc.fields);
        assert!(record.image.is_none());
        assert!(record.image_chunk_count > 1);

        let chunks = memory
            .run_query(&Query::collection(
                posts_root()
                    .doc(id.as_str())
                    .collection(IMAGE_CHUNKS_COLLECTION),
            ))
            .await
            .unwrap();
        assert_eq!(chunks.len(), record.image_chunk_count as usize);

        let sample = ImageChunkRecord::from_fields(&chunks[0].fields);
        assert_eq!(sample.parent_post_id, Some(id.clone()));
        assert_eq!(sample.total_chunks, record.image_chunk_count);
    }

    #[tokio::test]
    async fn test_chunked_post_round_trips_through_the_feed() {
        let options = ClientOptions {
            chunk_budget: 500,
            ..ClientOptions::default()
        };
        let (_memory, client) = client_with_options(options).await;
        client.create_post(&picture(), "gallery").await.unwrap();

        let mut subscription = client.feed();
        loop {
            match timeout(Duration::from_secs(2), subscription.recv())
                .await
                .expect("feed stayed silent")
            {
                Some(FeedEvent::Snapshot(snapshot)) => {
                    assert_eq!(snapshot.posts.len(), 1);
                    if snapshot.posts[0].image.is_ready() {
                        let uri = snapshot.posts[0].image.uri();
                        assert!(uri.starts_with("data:image/jpeg;base64,"));
                        break;
                    }
                }
                other => panic!("expected snapshot, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_create_post_validation() {
        let (_memory, client) = test_client().await;

        let err = client.create_post(&picture(), "   ").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::EmptyCaption)
        ));

        let long = "a".repeat(MAX_CAPTION_CHARS + 1);
        let err = client.create_post(&picture(), &long).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::CaptionTooLong { .. })
        ));

        let empty = ImageUpload::new(Vec::new(), "image/png");
        let err = client.create_post(&empty, "hi").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::EmptyImage)
        ));

        let huge = ImageUpload::new(vec![0u8; MAX_UPLOAD_BYTES + 1], "image/png");
        let err = client.create_post(&huge, "hi").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::ImageTooLarge { .. })
        ));

        let fake = ImageUpload::new(b"definitely not a png".to_vec(), "image/png");
        let err = client.create_post(&fake, "hi").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::UnsupportedImage { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_post_requires_a_session() {
        let (_memory, client) = test_client().await;
        client.sign_out().await;

        let err = client.create_post(&picture(), "hi").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Auth(crate::auth::AuthError::NotSignedIn)
        ));
    }

    #[tokio::test]
    async fn test_failed_create_leaves_nothing_behind() {
        let options = ClientOptions {
            chunk_budget: 500,
            ..ClientOptions::default()
        };
        let (memory, client) = client_with_options(options).await;
        let before = memory.doc_count().await;

        memory.fail_writes_after(0).await;
        let err = client.create_post(&picture(), "gallery").await.unwrap_err();
        assert!(matches!(err, ClientError::Store(_)));
        assert_eq!(memory.doc_count().await, before);
    }

    #[tokio::test]
    async fn test_delete_post_is_owner_only() {
        let (memory, client) = test_client().await;
        let id = client.create_post(&picture(), "mine").await.unwrap();
        client.add_comment(&id, "nice one").await.unwrap();
        let before = memory.doc_count().await;

        client.sign_out().await;
        client
            .register("rival@example.com", "secret1", None, None)
            .await
            .unwrap();
        let err = client.delete_post(&id).await.unwrap_err();
        assert!(matches!(err, ClientError::Forbidden(_)));
        assert_eq!(memory.doc_count().await, before + 1); // only the rival's profile

        client.sign_in("ines@example.com", "secret1").await.unwrap();
        client.delete_post(&id).await.unwrap();
        assert!(memory
            .get(&posts_root().doc(id.as_str()))
            .await
            .unwrap()
            .is_none());
        let comments = memory
            .run_query(&Query::collection(
                posts_root().doc(id.as_str()).collection(COMMENTS_COLLECTION),
            ))
            .await
            .unwrap();
        assert!(comments.is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_chunks_with_the_post() {
        let options = ClientOptions {
            chunk_budget: 500,
            ..ClientOptions::default()
        };
        let (memory, client) = client_with_options(options).await;
        let id = client.create_post(&picture(), "gallery").await.unwrap();
        assert!(memory.doc_count().await > 2);

        client.delete_post(&id).await.unwrap();
        assert_eq!(memory.doc_count().await, 1); // the profile document
    }

    #[tokio::test]
    async fn test_likes_have_set_semantics() {
        let (memory, client) = test_client().await;
        let id = client.create_post(&picture(), "likeable").await.unwrap();
        let ines = client.current_user().await.unwrap().uid;

        client.like_post(&id).await.unwrap();
        client.like_post(&id).await.unwrap();

        client.sign_out().await;
        client
            .register("rival@example.com", "secret1", None, None)
            .await
            .unwrap();
        client.like_post(&id).await.unwrap();

        let doc = memory
            .get(&posts_root().doc(id.as_str()))
            .await
            .unwrap()
            .unwrap();
        let record = PostRecord::from_fields(&doc.fields);
        assert_eq!(record.likes.len(), 2);
        assert!(record.likes.contains(&ines));

        client.unlike_post(&id).await.unwrap();
        let doc = memory
            .get(&posts_root().doc(id.as_str()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(PostRecord::from_fields(&doc.fields).likes, vec![ines]);
    }

    #[tokio::test]
    async fn test_like_on_missing_post_reports_not_found() {
        let (_memory, client) = test_client().await;
        let err = client.like_post(&PostId::from("gone")).await.unwrap_err();
        assert!(matches!(err, ClientError::PostNotFound(_)));
    }

    #[test]
    fn test_build_post_batch_inline_when_it_fits() {
        let record = PostRecord {
            user_id: Some(UserId::from("u1")),
            ..PostRecord::default()
        };
        let (batch, chunks) =
            build_post_batch(&PostId::from("p1"), record, "data:image/jpeg;base64,AA", 1_000);
        assert_eq!(chunks, 0);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_build_post_batch_chunk_layout() {
        let image = format!("data:image/jpeg;base64,{}", "A".repeat(977));
        // 1000 characters in total: budget 400 cuts them 400/400/200.
        let (batch, chunks) = build_post_batch(
            &PostId::from("p1"),
            PostRecord::default(),
            &image,
            400,
        );
        assert_eq!(chunks, 3);
        assert_eq!(batch.len(), 4);

        let ops = batch.ops();
        assert_eq!(ops[0].doc().path(), "posts/p1");
        assert_eq!(ops[1].doc().path(), "posts/p1/imageChunks/0");
        assert_eq!(ops[3].doc().path(), "posts/p1/imageChunks/2");
    }
}
