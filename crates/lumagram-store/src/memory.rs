//! In-memory reference backend.
//!
//! Behaves the way the hosted database looked from the web client: atomic
//! batches, a hard per-document size ceiling, and live queries that re-emit
//! the full result set after every commit touching their collection.  Fault
//! injection hooks cover the failure paths the app layer has to survive.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use lumagram_shared::constants::MAX_DOCUMENT_BYTES;
use lumagram_shared::Fields;

use crate::batch::{WriteBatch, WriteOp};
use crate::document::{encoded_len, Document};
use crate::error::{Result, StoreError};
use crate::path::{CollectionRef, DocRef};
use crate::query::Query;
use crate::store::{DocumentStore, Watch, WatchEvent};

/// Size limits enforced on writes.
#[derive(Debug, Clone)]
pub struct StoreLimits {
    /// Per-document ceiling in encoded bytes.
    pub max_document_bytes: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_document_bytes: MAX_DOCUMENT_BYTES,
        }
    }
}

/// What the change broadcast tells attached watches.
#[derive(Debug, Clone)]
enum ChangeNotice {
    /// A commit touched documents under these collection paths.
    Mutated(Arc<[String]>),
    /// The backend connection is gone; watches end with this error.
    Severed(StoreError),
}

#[derive(Debug)]
struct ReadFault {
    prefix: String,
    remaining: usize,
    error: StoreError,
}

#[derive(Debug)]
struct ReadDelay {
    prefix: String,
    delay: Duration,
}

#[derive(Debug, Default)]
struct Faults {
    writes_before_failure: Option<usize>,
    read_faults: Vec<ReadFault>,
    read_delays: Vec<ReadDelay>,
    next_watch_error: Option<StoreError>,
}

struct Shared {
    docs: Mutex<BTreeMap<DocRef, Fields>>,
    changes: broadcast::Sender<ChangeNotice>,
    limits: StoreLimits,
    faults: Mutex<Faults>,
}

/// The in-memory backend.  Cloning hands out another handle to the same
/// documents.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_limits(StoreLimits::default())
    }

    pub fn with_limits(limits: StoreLimits) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            shared: Arc::new(Shared {
                docs: Mutex::new(BTreeMap::new()),
                changes,
                limits,
                faults: Mutex::new(Faults::default()),
            }),
        }
    }

    /// Lets the next `n` writes succeed, then fails every one after.
    pub async fn fail_writes_after(&self, n: usize) {
        self.shared.faults.lock().await.writes_before_failure = Some(n);
    }

    /// Fails the next `times` reads under the path prefix with the error.
    pub async fn fail_reads(&self, prefix: &str, times: usize, error: StoreError) {
        self.shared.faults.lock().await.read_faults.push(ReadFault {
            prefix: prefix.to_owned(),
            remaining: times,
            error,
        });
    }

    /// Adds a delay in front of every read under the path prefix.
    pub async fn delay_reads(&self, prefix: &str, delay: Duration) {
        self.shared.faults.lock().await.read_delays.push(ReadDelay {
            prefix: prefix.to_owned(),
            delay,
        });
    }

    /// Ends the next attached watch immediately with the error.
    pub async fn fail_next_watch(&self, error: StoreError) {
        self.shared.faults.lock().await.next_watch_error = Some(error);
    }

    /// Ends every attached watch with the error.
    pub fn sever_watches(&self, error: StoreError) {
        let _ = self.shared.changes.send(ChangeNotice::Severed(error));
    }

    /// Number of documents currently stored.
    pub async fn doc_count(&self) -> usize {
        self.shared.docs.lock().await.len()
    }
}

impl Shared {
    async fn check_read(&self, path: &str) -> Result<()> {
        let delay = {
            let faults = self.faults.lock().await;
            faults
                .read_delays
                .iter()
                .find(|slow| path.starts_with(&slow.prefix))
                .map(|slow| slow.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut faults = self.faults.lock().await;
        for fault in faults.read_faults.iter_mut() {
            if fault.remaining > 0 && path.starts_with(&fault.prefix) {
                fault.remaining -= 1;
                return Err(fault.error.clone());
            }
        }
        Ok(())
    }

    async fn query_docs(&self, query: &Query) -> Result<Vec<Document>> {
        check_collection_path(query.collection_ref())?;
        self.check_read(query.collection_ref().path()).await?;
        let docs = self.docs.lock().await;
        let mut results: Vec<Document> = docs
            .iter()
            .filter(|(doc_ref, fields)| {
                in_collection(doc_ref, query.collection_ref()) && query.matches(fields)
            })
            .map(|(doc_ref, fields)| Document::new(doc_ref.clone(), fields.clone()))
            .collect();
        drop(docs);
        query.sort(&mut results);
        Ok(results)
    }

    async fn commit_ops(&self, ops: Vec<WriteOp>) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }
        {
            let mut faults = self.faults.lock().await;
            if let Some(left) = faults.writes_before_failure.as_mut() {
                if *left == 0 {
                    return Err(StoreError::Unavailable("injected write failure".to_owned()));
                }
                *left -= 1;
            }
        }

        let mut touched: Vec<String> = Vec::new();
        for op in &ops {
            if let Some(parent) = op.doc().parent() {
                let path = parent.path().to_owned();
                if !touched.contains(&path) {
                    touched.push(path);
                }
            }
        }

        let op_count = ops.len();
        let mut docs = self.docs.lock().await;
        // Stage on a copy so a failing op leaves the live tree untouched.
        let mut staged = docs.clone();
        for op in ops {
            apply(&mut staged, op, &self.limits)?;
        }
        *docs = staged;
        drop(docs);

        debug!(ops = op_count, collections = ?touched, "committed batch");
        let _ = self.changes.send(ChangeNotice::Mutated(touched.into()));
        Ok(())
    }

    fn attach_watch(self: &Arc<Self>, query: Query, injected: Option<StoreError>) -> Watch {
        let (tx, rx) = mpsc::channel(16);
        let mut changes = self.changes.subscribe();
        let shared = Arc::clone(self);

        tokio::spawn(async move {
            if let Some(err) = injected {
                let _ = tx.send(WatchEvent::Error(err)).await;
                return;
            }
            match shared.query_docs(&query).await {
                Ok(snapshot) => {
                    if tx.send(WatchEvent::Snapshot(snapshot)).await.is_err() {
                        return;
                    }
                }
                Err(err) => {
                    let _ = tx.send(WatchEvent::Error(err)).await;
                    return;
                }
            }

            loop {
                let relevant = tokio::select! {
                    _ = tx.closed() => break,
                    notice = changes.recv() => match notice {
                        Ok(ChangeNotice::Mutated(paths)) => {
                            paths.iter().any(|p| p == query.collection_ref().path())
                        }
                        Ok(ChangeNotice::Severed(err)) => {
                            let _ = tx.send(WatchEvent::Error(err)).await;
                            break;
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "live query lagged behind commits");
                            true
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                };
                if !relevant {
                    continue;
                }
                match shared.query_docs(&query).await {
                    Ok(snapshot) => {
                        if tx.send(WatchEvent::Snapshot(snapshot)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(WatchEvent::Error(err)).await;
                        break;
                    }
                }
            }
        });

        Watch::new(rx)
    }
}

fn in_collection(doc: &DocRef, collection: &CollectionRef) -> bool {
    match doc.path().strip_prefix(collection.path()) {
        Some(rest) => rest.starts_with('/') && !rest[1..].contains('/'),
        None => false,
    }
}

/// Collections and documents alternate along a path, so a document path has
/// an even number of non-empty segments and a collection path an odd number.
/// An empty id, or an id containing `/`, breaks that shape.
fn check_doc_path(doc: &DocRef) -> Result<()> {
    let mut segments = 0usize;
    for segment in doc.path().split('/') {
        if segment.is_empty() {
            return Err(StoreError::InvalidPath(doc.path().to_owned()));
        }
        segments += 1;
    }
    if segments % 2 != 0 {
        return Err(StoreError::InvalidPath(doc.path().to_owned()));
    }
    Ok(())
}

fn check_collection_path(collection: &CollectionRef) -> Result<()> {
    let mut segments = 0usize;
    for segment in collection.path().split('/') {
        if segment.is_empty() {
            return Err(StoreError::InvalidPath(collection.path().to_owned()));
        }
        segments += 1;
    }
    if segments % 2 != 1 {
        return Err(StoreError::InvalidPath(collection.path().to_owned()));
    }
    Ok(())
}

fn check_ceiling(fields: &Fields, limits: &StoreLimits) -> Result<()> {
    let size = encoded_len(fields);
    if size > limits.max_document_bytes {
        return Err(StoreError::DocumentTooLarge {
            size,
            limit: limits.max_document_bytes,
        });
    }
    Ok(())
}

fn apply(staged: &mut BTreeMap<DocRef, Fields>, op: WriteOp, limits: &StoreLimits) -> Result<()> {
    check_doc_path(op.doc())?;
    match op {
        WriteOp::Set { doc, fields } => {
            check_ceiling(&fields, limits)?;
            staged.insert(doc, fields);
        }
        WriteOp::Update { doc, fields } => {
            let existing = staged
                .get_mut(&doc)
                .ok_or_else(|| StoreError::NotFound(doc.path().to_owned()))?;
            for (key, value) in fields {
                existing.insert(key, value);
            }
            check_ceiling(existing, limits)?;
        }
        WriteOp::ArrayUnion { doc, field, values } => {
            let existing = staged
                .get_mut(&doc)
                .ok_or_else(|| StoreError::NotFound(doc.path().to_owned()))?;
            let entry = existing
                .entry(field)
                .or_insert_with(|| Value::Array(Vec::new()));
            if !entry.is_array() {
                *entry = Value::Array(Vec::new());
            }
            if let Value::Array(items) = entry {
                for value in values {
                    if !items.contains(&value) {
                        items.push(value);
                    }
                }
            }
            check_ceiling(existing, limits)?;
        }
        WriteOp::ArrayRemove { doc, field, values } => {
            let existing = staged
                .get_mut(&doc)
                .ok_or_else(|| StoreError::NotFound(doc.path().to_owned()))?;
            if let Some(Value::Array(items)) = existing.get_mut(&field) {
                items.retain(|item| !values.contains(item));
            }
        }
        WriteOp::Delete { doc } => {
            staged.remove(&doc);
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn new_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    async fn get(&self, doc: &DocRef) -> Result<Option<Document>> {
        check_doc_path(doc)?;
        self.shared.check_read(doc.path()).await?;
        let docs = self.shared.docs.lock().await;
        Ok(docs
            .get(doc)
            .map(|fields| Document::new(doc.clone(), fields.clone())))
    }

    async fn set(&self, doc: &DocRef, fields: Fields) -> Result<()> {
        self.shared
            .commit_ops(vec![WriteOp::Set {
                doc: doc.clone(),
                fields,
            }])
            .await
    }

    async fn update(&self, doc: &DocRef, fields: Fields) -> Result<()> {
        self.shared
            .commit_ops(vec![WriteOp::Update {
                doc: doc.clone(),
                fields,
            }])
            .await
    }

    async fn delete(&self, doc: &DocRef) -> Result<()> {
        self.shared
            .commit_ops(vec![WriteOp::Delete { doc: doc.clone() }])
            .await
    }

    async fn run_query(&self, query: &Query) -> Result<Vec<Document>> {
        self.shared.query_docs(query).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        self.shared.commit_ops(batch.into_ops()).await
    }

    async fn watch(&self, query: &Query) -> Result<Watch> {
        let injected = self.shared.faults.lock().await.next_watch_error.take();
        Ok(self.shared.attach_watch(query.clone(), injected))
    }
}
