use lumagram_shared::Fields;

use crate::path::DocRef;

/// A stored document: its reference plus the raw field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub doc_ref: DocRef,
    pub fields: Fields,
}

impl Document {
    pub fn new(doc_ref: DocRef, fields: Fields) -> Self {
        Self { doc_ref, fields }
    }

    /// The document id, i.e. the last path segment.
    pub fn id(&self) -> &str {
        self.doc_ref.id()
    }
}

/// Approximate stored size of a field map, checked against the per-document
/// ceiling.  JSON field maps always serialize, so the error arm collapses to
/// "too large".
pub(crate) fn encoded_len(fields: &Fields) -> usize {
    serde_json::to_vec(fields).map(|raw| raw.len()).unwrap_or(usize::MAX)
}
