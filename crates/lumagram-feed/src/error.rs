use thiserror::Error;

use lumagram_store::{ErrorCategory, StoreError};

/// Why a live subscription ended.
#[derive(Error, Debug, Clone)]
pub enum FeedError {
    /// The backend listener reported a terminal error.  The subscription is
    /// dead; a caller who wants the feed back subscribes again.
    #[error("Subscription lost ({category}): {source}")]
    SubscriptionLost {
        category: ErrorCategory,
        source: StoreError,
    },
}

impl FeedError {
    pub(crate) fn lost(source: StoreError) -> Self {
        Self::SubscriptionLost {
            category: source.category(),
            source,
        }
    }

    /// Backend error code family, for app-level branching.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SubscriptionLost { category, .. } => *category,
        }
    }
}
