//! Background resolution of chunked pictures.
//!
//! Chunk fetches run in small concurrent batches with a pause in between so
//! a long feed does not slam the backend all at once.  Each failed load gets
//! one retry inside a fixed time budget, then the post falls back to a
//! random placeholder.

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use lumagram_media::chunks::{assemble_chunks, ChunkAssemblyError, ChunkPayload};
use lumagram_media::placeholder;
use lumagram_shared::constants::{IMAGE_CHUNKS_COLLECTION, POSTS_COLLECTION};
use lumagram_shared::{ImageChunkRecord, PostId};
use lumagram_store::{CollectionRef, Query, SharedStore, StoreError};

use crate::synchronizer::FeedConfig;
use crate::view::ImageState;

/// One chunked picture waiting to be resolved.
#[derive(Debug, Clone)]
pub(crate) struct ResolveRequest {
    pub post: PostId,
    pub expected: usize,
}

/// The settled picture of one post, tagged with the snapshot generation the
/// load was launched for.
#[derive(Debug, Clone)]
pub(crate) struct ResolveOutcome {
    pub generation: u64,
    pub post: PostId,
    pub image: ImageState,
}

#[derive(Error, Debug)]
enum ChunkLoadError {
    #[error("Chunk fetch failed: {0}")]
    Store(#[from] StoreError),

    #[error("Chunk assembly failed: {0}")]
    Assembly(#[from] ChunkAssemblyError),
}

/// Resolves every request, sending outcomes as they settle.  Returns early
/// when the subscription is cancelled.
pub(crate) async fn resolve_images(
    store: SharedStore,
    requests: Vec<ResolveRequest>,
    generation: u64,
    config: FeedConfig,
    results: mpsc::Sender<ResolveOutcome>,
    cancel: CancellationToken,
) {
    let mut batches = requests.chunks(config.batch_size.max(1)).peekable();
    while let Some(batch) = batches.next() {
        if cancel.is_cancelled() {
            return;
        }

        let loads = batch
            .iter()
            .map(|request| resolve_one(&store, request, &config));
        for (post, image) in join_all(loads).await {
            let _ = results
                .send(ResolveOutcome {
                    generation,
                    post,
                    image,
                })
                .await;
        }

        if batches.peek().is_some() {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(config.batch_pause) => {}
            }
        }
    }
}

async fn resolve_one(
    store: &SharedStore,
    request: &ResolveRequest,
    config: &FeedConfig,
) -> (PostId, ImageState) {
    let post = request.post.clone();
    match fetch_and_assemble(store, &post, request.expected).await {
        Ok(uri) => (post, ImageState::Ready { uri }),
        Err(err) => {
            debug!(post = %post, error = %err, "chunk load failed, retrying once");
            let retry = tokio::time::timeout(
                config.retry_budget,
                fetch_and_assemble(store, &post, request.expected),
            );
            match retry.await {
                Ok(Ok(uri)) => (post, ImageState::Ready { uri }),
                Ok(Err(err)) => {
                    warn!(post = %post, error = %err, "chunk retry failed, using fallback");
                    (post, failed())
                }
                Err(_) => {
                    warn!(post = %post, "chunk retry timed out, using fallback");
                    (post, failed())
                }
            }
        }
    }
}

fn failed() -> ImageState {
    ImageState::Failed {
        uri: placeholder::fallback_placeholder(),
    }
}

async fn fetch_and_assemble(
    store: &SharedStore,
    post: &PostId,
    expected: usize,
) -> Result<String, ChunkLoadError> {
    let chunks_ref = CollectionRef::root(POSTS_COLLECTION)
        .doc(post.as_str())
        .collection(IMAGE_CHUNKS_COLLECTION);
    let docs = store.run_query(&Query::collection(chunks_ref)).await?;

    let chunks: Vec<ChunkPayload> = docs
        .iter()
        .map(|doc| {
            let record = ImageChunkRecord::from_fields(&doc.fields);
            ChunkPayload {
                index: record.index as usize,
                data: record.data,
            }
        })
        .collect();

    Ok(assemble_chunks(&chunks, expected)?)
}
