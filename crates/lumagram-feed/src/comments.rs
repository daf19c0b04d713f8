//! Live comment streams for a single post, oldest first.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use lumagram_shared::constants::{COMMENTS_COLLECTION, POSTS_COLLECTION};
use lumagram_shared::{CommentId, CommentRecord, PostId};
use lumagram_store::{CollectionRef, Direction, Query, SharedStore, WatchEvent};

use crate::error::FeedError;
use crate::synchronizer::FeedSynchronizer;
use crate::view::CommentView;

/// Events delivered to a comment subscriber.
#[derive(Debug, Clone)]
pub enum CommentEvent {
    /// The post's full comment list, oldest first.
    Snapshot(Vec<CommentView>),
    /// The subscription ended.  Nothing follows.
    Terminated(FeedError),
}

/// Handle on a live comment stream.  Dropping it cancels the subscription.
pub struct CommentSubscription {
    events: mpsc::Receiver<CommentEvent>,
    cancel: CancellationToken,
}

impl CommentSubscription {
    pub async fn recv(&mut self) -> Option<CommentEvent> {
        self.events.recv().await
    }

    /// Stops the subscription.  Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for CommentSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl FeedSynchronizer {
    /// Subscribes to one post's comments, oldest first.
    pub fn watch_comments(&self, post: &PostId) -> CommentSubscription {
        let query = Query::collection(
            CollectionRef::root(POSTS_COLLECTION)
                .doc(post.as_str())
                .collection(COMMENTS_COLLECTION),
        )
        .order_by("createdAt", Direction::Ascending);

        let (event_tx, event_rx) = mpsc::channel(self.config.channel_capacity);
        let cancel = CancellationToken::new();
        let store = Arc::clone(&self.store);
        let loop_cancel = cancel.clone();

        tokio::spawn(async move {
            run_comment_loop(store, query, event_tx, loop_cancel).await;
        });

        CommentSubscription {
            events: event_rx,
            cancel,
        }
    }
}

async fn run_comment_loop(
    store: SharedStore,
    query: Query,
    events: mpsc::Sender<CommentEvent>,
    cancel: CancellationToken,
) {
    let mut watch = tokio::select! {
        _ = cancel.cancelled() => return,
        attached = store.watch(&query) => match attached {
            Ok(watch) => watch,
            Err(err) => {
                warn!(category = %err.category(), "comment listener attach failed");
                let _ = events.send(CommentEvent::Terminated(FeedError::lost(err))).await;
                return;
            }
        },
    };

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("comment subscription cancelled");
                break;
            }

            event = watch.recv() => match event {
                Some(WatchEvent::Snapshot(docs)) => {
                    let now = Utc::now();
                    let comments = docs
                        .iter()
                        .map(|doc| {
                            let record = CommentRecord::from_fields(&doc.fields);
                            CommentView::from_record(CommentId::from(doc.id()), &record, now)
                        })
                        .collect();
                    if events.send(CommentEvent::Snapshot(comments)).await.is_err() {
                        break;
                    }
                }
                Some(WatchEvent::Error(err)) => {
                    warn!(category = %err.category(), "comment listener failed");
                    let _ = events.send(CommentEvent::Terminated(FeedError::lost(err))).await;
                    break;
                }
                None => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lumagram_store::{DocumentStore, MemoryStore, StoreError};
    use std::time::Duration;
    use tokio::time::timeout;

    fn comment_fields(minute: u32, text: &str) -> lumagram_shared::Fields {
        CommentRecord {
            user_id: Some("author-1".into()),
            username: Some("ines".to_owned()),
            avatar: None,
            text: Some(text.to_owned()),
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 10, minute, 0).single(),
        }
        .to_fields()
    }

    fn comments_of(post: &str) -> CollectionRef {
        CollectionRef::root(POSTS_COLLECTION)
            .doc(post)
            .collection(COMMENTS_COLLECTION)
    }

    async fn next_snapshot(subscription: &mut CommentSubscription) -> Vec<CommentView> {
        match timeout(Duration::from_millis(500), subscription.recv()).await {
            Ok(Some(CommentEvent::Snapshot(comments))) => comments,
            other => panic!("expected comment snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_comments_arrive_oldest_first() {
        let memory = MemoryStore::new();
        memory
            .set(&comments_of("p1").doc("late"), comment_fields(5, "second"))
            .await
            .unwrap();
        memory
            .set(&comments_of("p1").doc("early"), comment_fields(1, "first"))
            .await
            .unwrap();

        let shared: SharedStore = Arc::new(memory.clone());
        let feed = FeedSynchronizer::new(shared);
        let mut subscription = feed.watch_comments(&PostId::from("p1"));

        let comments = next_snapshot(&mut subscription).await;
        let texts: Vec<&str> = comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_new_comment_triggers_snapshot() {
        let memory = MemoryStore::new();
        let shared: SharedStore = Arc::new(memory.clone());
        let feed = FeedSynchronizer::new(shared);
        let mut subscription = feed.watch_comments(&PostId::from("p1"));

        assert!(next_snapshot(&mut subscription).await.is_empty());

        memory
            .set(&comments_of("p1").doc("c1"), comment_fields(1, "hello"))
            .await
            .unwrap();
        let comments = next_snapshot(&mut subscription).await;
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].username, "ines");
    }

    #[tokio::test]
    async fn test_other_posts_comments_stay_out() {
        let memory = MemoryStore::new();
        memory
            .set(&comments_of("p1").doc("c1"), comment_fields(1, "mine"))
            .await
            .unwrap();
        memory
            .set(&comments_of("p2").doc("c2"), comment_fields(2, "theirs"))
            .await
            .unwrap();

        let shared: SharedStore = Arc::new(memory.clone());
        let feed = FeedSynchronizer::new(shared);
        let mut subscription = feed.watch_comments(&PostId::from("p1"));

        let comments = next_snapshot(&mut subscription).await;
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "mine");
    }

    #[tokio::test]
    async fn test_watch_error_terminates_comment_stream() {
        let memory = MemoryStore::new();
        memory.fail_next_watch(StoreError::Unauthenticated).await;

        let shared: SharedStore = Arc::new(memory.clone());
        let feed = FeedSynchronizer::new(shared);
        let mut subscription = feed.watch_comments(&PostId::from("p1"));

        match subscription.recv().await {
            Some(CommentEvent::Terminated(err)) => {
                assert_eq!(err.category().as_str(), "unauthenticated");
            }
            other => panic!("expected termination, got {other:?}"),
        }
        assert!(subscription.recv().await.is_none());
    }
}
