//! Session management behind a trait, so the app layer never touches a
//! concrete auth backend.  The provider holds sign-in state and the display
//! name; everything else about an account lives in profile documents.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use lumagram_shared::constants::MIN_PASSWORD_CHARS;
use lumagram_shared::UserId;

/// Errors produced by the auth provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("No active session")]
    NotSignedIn,

    #[error("Email already registered: {0}")]
    EmailTaken(String),

    #[error("Malformed email address: {0}")]
    InvalidEmail(String),

    #[error("Password must be at least 6 characters")]
    WeakPassword,

    #[error("Wrong email or password")]
    InvalidCredentials,
}

/// An authenticated account as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: UserId,
    pub email: String,
    /// Display name held by the provider, when one has been set.
    pub display_name: Option<String>,
}

impl AuthUser {
    /// Name to show for this account: the chosen display name, else the
    /// email local part.
    pub fn visible_name(&self) -> String {
        self.display_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| email_local_part(&self.email))
    }
}

/// The part of an email before the `@`, the fallback display name.
pub fn email_local_part(email: &str) -> String {
    match email.split_once('@') {
        Some((local, _)) => local.to_owned(),
        None => email.to_owned(),
    }
}

/// A session backend: sign-up/sign-in plus live session observation.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Creates an account and signs it in.
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;

    /// Signs in to an existing account.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;

    /// Ends the session.  Idempotent.
    async fn sign_out(&self);

    /// The signed-in account, if any.
    async fn current_user(&self) -> Option<AuthUser>;

    /// Watches the session; the value is `None` while signed out.
    fn watch_session(&self) -> watch::Receiver<Option<AuthUser>>;

    /// Changes the display name of the signed-in account.
    async fn update_display_name(&self, name: &str) -> Result<AuthUser, AuthError>;
}

/// Shared auth handle used across the app layer.
pub type SharedAuth = Arc<dyn AuthProvider>;

struct Account {
    password: String,
    user: AuthUser,
}

/// In-memory provider for tests and local development.
pub struct MemoryAuthProvider {
    accounts: Mutex<HashMap<String, Account>>,
    session: watch::Sender<Option<AuthUser>>,
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            session,
        }
    }
}

impl Default for MemoryAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        if !email.contains('@') {
            return Err(AuthError::InvalidEmail(email.to_owned()));
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AuthError::WeakPassword);
        }

        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(email) {
            return Err(AuthError::EmailTaken(email.to_owned()));
        }

        let user = AuthUser {
            uid: UserId::from(Uuid::new_v4().simple().to_string()),
            email: email.to_owned(),
            display_name: None,
        };
        accounts.insert(
            email.to_owned(),
            Account {
                password: password.to_owned(),
                user: user.clone(),
            },
        );
        self.session.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let accounts = self.accounts.lock().await;
        // Unknown email and wrong password answer the same way.
        let account = accounts
            .get(email)
            .filter(|account| account.password == password)
            .ok_or(AuthError::InvalidCredentials)?;

        let user = account.user.clone();
        self.session.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) {
        self.session.send_replace(None);
    }

    async fn current_user(&self) -> Option<AuthUser> {
        self.session.borrow().clone()
    }

    fn watch_session(&self) -> watch::Receiver<Option<AuthUser>> {
        self.session.subscribe()
    }

    async fn update_display_name(&self, name: &str) -> Result<AuthUser, AuthError> {
        let current = self.session.borrow().clone().ok_or(AuthError::NotSignedIn)?;

        let mut accounts = self.accounts.lock().await;
        let account = accounts
            .get_mut(&current.email)
            .ok_or(AuthError::NotSignedIn)?;
        account.user.display_name = Some(name.to_owned());
        let user = account.user.clone();
        self.session.send_replace(Some(user.clone()));
        Ok(user)
    }
}
