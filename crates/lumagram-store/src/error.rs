use thiserror::Error;

/// Errors produced by the document store layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A write targeted a document that does not exist.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// The caller has no valid session.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// The backend rejected the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The backend could not be reached or gave up.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// A write would push a document over the per-document ceiling.
    #[error("Document too large: {size} bytes (limit {limit})")]
    DocumentTooLarge { size: usize, limit: usize },

    /// A reference holds an empty segment or breaks the collection/document
    /// alternation, e.g. a document id containing `/`.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Anything the backend reports without a closer match.
    #[error("Store error: {0}")]
    Other(String),
}

impl StoreError {
    /// Coarse category, named the way the hosted backend names its codes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::PermissionDenied(_) => ErrorCategory::PermissionDenied,
            Self::Unavailable(_) => ErrorCategory::Unavailable,
            Self::Unauthenticated => ErrorCategory::Unauthenticated,
            Self::NotFound(_)
            | Self::DocumentTooLarge { .. }
            | Self::InvalidPath(_)
            | Self::Other(_) => ErrorCategory::Unknown,
        }
    }
}

/// Backend error code families the app layer branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    PermissionDenied,
    Unavailable,
    Unauthenticated,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission-denied",
            Self::Unavailable => "unavailable",
            Self::Unauthenticated => "unauthenticated",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
