//! # lumagram-store
//!
//! Document database abstraction modeled on the hosted backend the web
//! client ran against: schemaless JSON documents in slash-path collections,
//! live queries, and atomic write batches.
//!
//! The crate ships a single trait, [`DocumentStore`], plus an in-memory
//! reference backend used by the test suites and by anything that wants the
//! full client stack without network access.

pub mod batch;
pub mod document;
pub mod memory;
pub mod path;
pub mod query;
pub mod store;

mod error;

pub use batch::{WriteBatch, WriteOp};
pub use document::Document;
pub use error::{ErrorCategory, Result, StoreError};
pub use memory::{MemoryStore, StoreLimits};
pub use path::{CollectionRef, DocRef};
pub use query::{Direction, Query};
pub use store::{DocumentStore, SharedStore, Watch, WatchEvent};
