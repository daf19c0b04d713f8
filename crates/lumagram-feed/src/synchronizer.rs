//! Feed orchestration with the tokio task/channel pattern.
//!
//! Each subscription runs its own event loop in a dedicated task, listening
//! to the backend's live post query.  Snapshots go out immediately with
//! placeholders for chunked pictures; resolution results flow back over an
//! internal channel and patch the affected post only, so untouched posts
//! keep their shared allocation across snapshots.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lumagram_shared::constants::{
    CHUNK_RETRY_BUDGET_MS, POSTS_COLLECTION, RESOLVE_BATCH_PAUSE_MS, RESOLVE_BATCH_SIZE,
};
use lumagram_shared::{PostId, PostRecord, UserId};
use lumagram_store::{CollectionRef, Direction, Query, SharedStore, WatchEvent};

use crate::error::FeedError;
use crate::resolver::{resolve_images, ResolveOutcome, ResolveRequest};
use crate::view::{ImageState, PostView};

// ---------------------------------------------------------------------------
// Subscription types
// ---------------------------------------------------------------------------

/// A point-in-time rendering of the feed.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    /// Ordinal of the backend snapshot this rendering derives from.  Patch
    /// snapshots produced by image resolution keep their generation.
    pub generation: u64,
    /// Posts in query order, newest first.  Unchanged posts share their
    /// allocation with the previous snapshot.
    pub posts: Vec<Arc<PostView>>,
}

/// Events delivered to a feed subscriber.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// A fresh rendering: either a new backend snapshot or a patch with one
    /// more picture settled.
    Snapshot(FeedSnapshot),
    /// The subscription ended.  Nothing follows; subscribe again to retry.
    Terminated(FeedError),
}

/// Handle on a live feed.  Dropping it cancels the subscription.
pub struct FeedSubscription {
    events: mpsc::Receiver<FeedEvent>,
    cancel: CancellationToken,
}

impl FeedSubscription {
    /// The next event, or `None` once the subscription has wound down.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }

    /// Stops the subscription.  Idempotent.  The loop stops mutating and
    /// emitting at its next scheduling point; events already in the channel
    /// can still be drained.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

/// Tuning for the image resolution pipeline.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Chunked pictures resolved concurrently per batch.
    pub batch_size: usize,
    /// Pause between resolution batches.
    pub batch_pause: Duration,
    /// Budget for the single retry after a failed chunk load.
    pub retry_budget: Duration,
    /// Event channel capacity per subscription.
    pub channel_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            batch_size: RESOLVE_BATCH_SIZE,
            batch_pause: Duration::from_millis(RESOLVE_BATCH_PAUSE_MS),
            retry_budget: Duration::from_millis(CHUNK_RETRY_BUDGET_MS),
            channel_capacity: 32,
        }
    }
}

/// Mirrors backend post queries into rendered feed snapshots.
pub struct FeedSynchronizer {
    pub(crate) store: SharedStore,
    pub(crate) config: FeedConfig,
}

impl FeedSynchronizer {
    pub fn new(store: SharedStore) -> Self {
        Self::with_config(store, FeedConfig::default())
    }

    pub fn with_config(store: SharedStore, config: FeedConfig) -> Self {
        Self { store, config }
    }

    /// Subscribes to the global feed, newest first.
    pub fn subscribe(&self) -> FeedSubscription {
        self.spawn(self.feed_query())
    }

    /// Subscribes to one author's posts, newest first.
    pub fn subscribe_author(&self, author: &UserId) -> FeedSubscription {
        let query = self.feed_query().where_eq("userId", author.as_str());
        self.spawn(query)
    }

    fn feed_query(&self) -> Query {
        Query::collection(CollectionRef::root(POSTS_COLLECTION))
            .order_by("createdAt", Direction::Descending)
    }

    fn spawn(&self, query: Query) -> FeedSubscription {
        let (event_tx, event_rx) = mpsc::channel(self.config.channel_capacity);
        let cancel = CancellationToken::new();
        let store = Arc::clone(&self.store);
        let config = self.config.clone();
        let loop_cancel = cancel.clone();

        tokio::spawn(async move {
            run_feed_loop(store, query, config, event_tx, loop_cancel).await;
        });

        FeedSubscription {
            events: event_rx,
            cancel,
        }
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

/// Whether a resolution outcome may still be applied.
///
/// An outcome is stale once the loop has moved to a newer backend snapshot,
/// once its post left the feed, or once that post's picture already settled
/// some other way.  Stale outcomes are discarded, never merged.
fn should_apply(outcome: &ResolveOutcome, current_generation: u64, posts: &[Arc<PostView>]) -> bool {
    outcome.generation == current_generation
        && posts
            .iter()
            .any(|post| post.id == outcome.post && post.image.is_loading())
}

async fn run_feed_loop(
    store: SharedStore,
    query: Query,
    config: FeedConfig,
    events: mpsc::Sender<FeedEvent>,
    cancel: CancellationToken,
) {
    let mut watch = tokio::select! {
        _ = cancel.cancelled() => return,
        attached = store.watch(&query) => match attached {
            Ok(watch) => watch,
            Err(err) => {
                warn!(category = %err.category(), "feed listener attach failed");
                let _ = events.send(FeedEvent::Terminated(FeedError::lost(err))).await;
                return;
            }
        },
    };

    let (results_tx, mut results_rx) = mpsc::channel::<ResolveOutcome>(64);
    let mut generation: u64 = 0;
    let mut posts: Vec<Arc<PostView>> = Vec::new();
    // Pictures settled during this subscription, carried across backend
    // snapshots so a post is not re-resolved every time the feed changes.
    let mut settled: HashMap<PostId, ImageState> = HashMap::new();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("feed subscription cancelled");
                break;
            }

            event = watch.recv() => match event {
                Some(WatchEvent::Snapshot(docs)) => {
                    generation += 1;
                    let now = Utc::now();
                    let mut pending = Vec::new();

                    posts = docs
                        .iter()
                        .map(|doc| {
                            let record = PostRecord::from_fields(&doc.fields);
                            let id = PostId::from(doc.id());
                            let mut view = PostView::from_record(id.clone(), &record, now);
                            if view.image.is_loading() {
                                if let Some(image) = settled.get(&id) {
                                    view = view.with_image(image.clone());
                                } else {
                                    pending.push(ResolveRequest {
                                        post: id,
                                        expected: record.image_chunk_count as usize,
                                    });
                                }
                            }
                            Arc::new(view)
                        })
                        .collect();

                    info!(
                        generation,
                        posts = posts.len(),
                        unresolved = pending.len(),
                        "feed snapshot"
                    );
                    let snapshot = FeedSnapshot {
                        generation,
                        posts: posts.clone(),
                    };
                    if events.send(FeedEvent::Snapshot(snapshot)).await.is_err() {
                        break;
                    }

                    if !pending.is_empty() {
                        tokio::spawn(resolve_images(
                            Arc::clone(&store),
                            pending,
                            generation,
                            config.clone(),
                            results_tx.clone(),
                            cancel.clone(),
                        ));
                    }
                }
                Some(WatchEvent::Error(err)) => {
                    warn!(category = %err.category(), "feed listener failed");
                    let _ = events.send(FeedEvent::Terminated(FeedError::lost(err))).await;
                    break;
                }
                None => break,
            },

            Some(outcome) = results_rx.recv() => {
                if !should_apply(&outcome, generation, &posts) {
                    debug!(
                        post = %outcome.post,
                        generation = outcome.generation,
                        "discarding stale image result"
                    );
                    continue;
                }
                settled.insert(outcome.post.clone(), outcome.image.clone());
                // Patch by id: the post may have moved since the load began.
                if let Some(at) = posts.iter().position(|post| post.id == outcome.post) {
                    posts[at] = Arc::new(posts[at].with_image(outcome.image));
                    let snapshot = FeedSnapshot {
                        generation,
                        posts: posts.clone(),
                    };
                    if events.send(FeedEvent::Snapshot(snapshot)).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}
