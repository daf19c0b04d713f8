//! Atomic multi-document writes.

use serde_json::Value;

use lumagram_shared::Fields;

use crate::path::DocRef;

/// One write inside a batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Create the document or replace it wholesale.
    Set { doc: DocRef, fields: Fields },
    /// Merge fields into an existing document.
    Update { doc: DocRef, fields: Fields },
    /// Append values to an array field, skipping ones already present.
    ArrayUnion {
        doc: DocRef,
        field: String,
        values: Vec<Value>,
    },
    /// Remove every occurrence of the values from an array field.
    ArrayRemove {
        doc: DocRef,
        field: String,
        values: Vec<Value>,
    },
    /// Delete the document.  Deleting a missing document is a no-op.
    Delete { doc: DocRef },
}

impl WriteOp {
    pub fn doc(&self) -> &DocRef {
        match self {
            Self::Set { doc, .. }
            | Self::Update { doc, .. }
            | Self::ArrayUnion { doc, .. }
            | Self::ArrayRemove { doc, .. }
            | Self::Delete { doc } => doc,
        }
    }
}

/// An ordered set of writes that commits atomically: either every operation
/// lands or none do.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, doc: DocRef, fields: Fields) -> &mut Self {
        self.ops.push(WriteOp::Set { doc, fields });
        self
    }

    pub fn update(&mut self, doc: DocRef, fields: Fields) -> &mut Self {
        self.ops.push(WriteOp::Update { doc, fields });
        self
    }

    pub fn array_union(&mut self, doc: DocRef, field: &str, values: Vec<Value>) -> &mut Self {
        self.ops.push(WriteOp::ArrayUnion {
            doc,
            field: field.to_owned(),
            values,
        });
        self
    }

    pub fn array_remove(&mut self, doc: DocRef, field: &str, values: Vec<Value>) -> &mut Self {
        self.ops.push(WriteOp::ArrayRemove {
            doc,
            field: field.to_owned(),
            values,
        });
        self
    }

    pub fn delete(&mut self, doc: DocRef) -> &mut Self {
        self.ops.push(WriteOp::Delete { doc });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}
