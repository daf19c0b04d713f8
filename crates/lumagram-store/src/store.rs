//! The backend trait and live-query plumbing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use lumagram_shared::Fields;

use crate::batch::WriteBatch;
use crate::document::Document;
use crate::error::{Result, StoreError};
use crate::path::DocRef;
use crate::query::Query;

/// Events delivered by a live query.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// The full, ordered result set.  Sent once on attach and again after
    /// every committed write touching the queried collection.
    Snapshot(Vec<Document>),
    /// Terminal failure.  No snapshots follow.
    Error(StoreError),
}

/// Handle on a live query.  Dropping it detaches the listener.
pub struct Watch {
    events: mpsc::Receiver<WatchEvent>,
}

impl Watch {
    pub fn new(events: mpsc::Receiver<WatchEvent>) -> Self {
        Self { events }
    }

    /// The next event, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.events.recv().await
    }
}

/// A handle to the hosted document database.
///
/// Writes go through [`commit`](DocumentStore::commit) when they must land
/// atomically; the single-document methods are conveniences for one-off
/// writes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Mints a collision-free document id.
    fn new_id(&self) -> String;

    /// Reads one document.  A missing document is `Ok(None)`, not an error.
    async fn get(&self, doc: &DocRef) -> Result<Option<Document>>;

    /// Creates or replaces one document.
    async fn set(&self, doc: &DocRef, fields: Fields) -> Result<()>;

    /// Merges fields into one existing document.
    async fn update(&self, doc: &DocRef, fields: Fields) -> Result<()>;

    /// Deletes one document.  Idempotent.
    async fn delete(&self, doc: &DocRef) -> Result<()>;

    /// Runs a query once.
    async fn run_query(&self, query: &Query) -> Result<Vec<Document>>;

    /// Applies a write batch atomically.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Attaches a live query.  Failures after attach arrive as
    /// [`WatchEvent::Error`] and end the stream.
    async fn watch(&self, query: &Query) -> Result<Watch>;
}

/// Shared store handle used across the app layer.
pub type SharedStore = Arc<dyn DocumentStore>;
