//! # lumagram-client
//!
//! App-facing operations: account registration, posting, likes, comments,
//! and profile management over the document store, plus feed subscriptions
//! through [`lumagram_feed`].  The [`Client`] struct is the one handle a UI
//! needs.

pub mod auth;

mod comments;
mod error;
mod posts;
mod profile;

pub use error::{ClientError, Result, ValidationError};
pub use profile::{ProfileUpdate, ProfileView};

use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use lumagram_feed::{CommentSubscription, FeedSubscription, FeedSynchronizer};
use lumagram_media::CompressionProfile;
use lumagram_shared::constants::{DOC_CHAR_BUDGET, POSTS_COLLECTION, USERS_COLLECTION};
use lumagram_shared::{PostId, UserId};
use lumagram_store::{CollectionRef, SharedStore};

use crate::auth::{AuthError, AuthUser, SharedAuth};

/// Initializes structured logging for binaries and demos.  Honors
/// `RUST_LOG`; call at most once per process.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("lumagram_client=debug,lumagram_feed=debug,lumagram_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Tuning for client-side writes.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Character budget per image document; pictures over it get chunked.
    pub chunk_budget: usize,
    /// Compression profile for post pictures.
    pub post_profile: CompressionProfile,
    /// Compression profile for avatars.
    pub avatar_profile: CompressionProfile,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            chunk_budget: DOC_CHAR_BUDGET,
            post_profile: CompressionProfile::post(),
            avatar_profile: CompressionProfile::avatar(),
        }
    }
}

/// Application facade over the store, the auth provider, and the feed.
pub struct Client {
    pub(crate) store: SharedStore,
    pub(crate) auth: SharedAuth,
    pub(crate) options: ClientOptions,
    feed: FeedSynchronizer,
}

impl Client {
    pub fn new(store: SharedStore, auth: SharedAuth) -> Self {
        Self::with_options(store, auth, ClientOptions::default())
    }

    pub fn with_options(store: SharedStore, auth: SharedAuth, options: ClientOptions) -> Self {
        let feed = FeedSynchronizer::new(Arc::clone(&store));
        Self {
            store,
            auth,
            options,
            feed,
        }
    }

    /// Live global feed, newest first.
    pub fn feed(&self) -> FeedSubscription {
        self.feed.subscribe()
    }

    /// Live feed of one author's posts, newest first.
    pub fn author_feed(&self, author: &UserId) -> FeedSubscription {
        self.feed.subscribe_author(author)
    }

    /// Live comment stream for one post, oldest first.
    pub fn watch_comments(&self, post: &PostId) -> CommentSubscription {
        self.feed.watch_comments(post)
    }

    /// The signed-in account, or the error saying there is none.
    pub(crate) async fn require_user(&self) -> Result<AuthUser> {
        self.auth
            .current_user()
            .await
            .ok_or(ClientError::Auth(AuthError::NotSignedIn))
    }
}

pub(crate) fn posts_root() -> CollectionRef {
    CollectionRef::root(POSTS_COLLECTION)
}

pub(crate) fn users_root() -> CollectionRef {
    CollectionRef::root(USERS_COLLECTION)
}
