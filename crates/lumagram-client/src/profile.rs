//! Accounts and profile documents.
//!
//! The auth provider owns credentials and the display name; everything else
//! about an account lives in a `users/{uid}` document.  Registration writes
//! that document, and a display-name change is mirrored to the provider so
//! both stay in agreement.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::info;

use lumagram_media::{compress_to_data_uri, placeholder, ImageUpload};
use lumagram_shared::constants::{ANONYMOUS_NAME, MAX_BIO_CHARS, MAX_DISPLAY_NAME_CHARS};
use lumagram_shared::{Fields, ProfileRecord, UserId};

use crate::auth::{email_local_part, AuthUser};
use crate::error::{ClientError, Result, ValidationError};
use crate::posts::validate_upload;
use crate::{users_root, Client};

/// A profile as the app renders it, with the same fallbacks the feed
/// applies: a missing display name shows the email local part, a missing
/// avatar shows a generated initial tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub bio: String,
    pub avatar: String,
    pub followers: u32,
    pub following: u32,
}

impl ProfileView {
    pub fn from_record(user_id: UserId, record: &ProfileRecord) -> Self {
        let display_name = record
            .display_name
            .clone()
            .filter(|name| !name.is_empty())
            .or_else(|| {
                record
                    .email
                    .as_deref()
                    .map(email_local_part)
                    .filter(|local| !local.is_empty())
            })
            .unwrap_or_else(|| ANONYMOUS_NAME.to_owned());
        let avatar = record
            .photo_url
            .clone()
            .unwrap_or_else(|| placeholder::avatar_placeholder(&display_name));

        Self {
            user_id,
            email: record.email.clone().unwrap_or_default(),
            display_name,
            bio: record.bio.clone().unwrap_or_default(),
            avatar,
            followers: record.followers,
            following: record.following,
        }
    }
}

/// Changes to apply to the signed-in account's profile.  `None` fields are
/// left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<ImageUpload>,
}

impl Client {
    /// Creates an account, signs it in, and writes its profile document.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
        bio: Option<&str>,
    ) -> Result<AuthUser> {
        let display_name = display_name.map(validate_display_name).transpose()?;
        if let Some(bio) = bio {
            validate_bio(bio)?;
        }

        let mut user = self.auth.sign_up(email, password).await?;
        if let Some(name) = &display_name {
            user = self.auth.update_display_name(name).await?;
        }

        let visible = user.visible_name();
        let record = ProfileRecord {
            email: Some(user.email.clone()),
            display_name: user.display_name.clone(),
            bio: bio.map(str::to_owned),
            photo_url: Some(placeholder::avatar_placeholder(&visible)),
            followers: 0,
            following: 0,
            created_at: Some(Utc::now()),
        };
        self.store
            .set(&users_root().doc(user.uid.as_str()), record.to_fields())
            .await?;
        info!(user = %user.uid, "account registered");
        Ok(user)
    }

    /// Signs in to an existing account.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser> {
        Ok(self.auth.sign_in(email, password).await?)
    }

    /// Ends the session.  Idempotent.
    pub async fn sign_out(&self) {
        self.auth.sign_out().await;
    }

    /// The signed-in account, if any.
    pub async fn current_user(&self) -> Option<AuthUser> {
        self.auth.current_user().await
    }

    /// Watches the session; the value is `None` while signed out.
    pub fn watch_session(&self) -> watch::Receiver<Option<AuthUser>> {
        self.auth.watch_session()
    }

    /// Reads a profile.  An account without a profile document still gets a
    /// rendered view, all defaults.
    pub async fn profile(&self, user: &UserId) -> Result<ProfileView> {
        let doc = self.store.get(&users_root().doc(user.as_str())).await?;
        let record = doc
            .map(|doc| ProfileRecord::from_fields(&doc.fields))
            .unwrap_or_default();
        Ok(ProfileView::from_record(user.clone(), &record))
    }

    /// Applies profile changes for the signed-in account and returns the
    /// refreshed view.
    ///
    /// A display-name change goes to the auth provider first, then to the
    /// profile document, so the session and the document agree.  The avatar
    /// is compressed like a post picture but must fit a single document;
    /// profiles have no chunked fallback.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<ProfileView> {
        let user = self.require_user().await?;

        let display_name = update
            .display_name
            .as_deref()
            .map(validate_display_name)
            .transpose()?;
        if let Some(bio) = &update.bio {
            validate_bio(bio)?;
        }
        let avatar = match &update.avatar {
            Some(upload) => {
                validate_upload(upload)?;
                let uri = compress_to_data_uri(&upload.bytes, &self.options.avatar_profile)?;
                if uri.len() > self.options.chunk_budget {
                    return Err(ClientError::AvatarTooLarge {
                        chars: uri.len(),
                        limit: self.options.chunk_budget,
                    });
                }
                Some(uri)
            }
            None => None,
        };

        if let Some(name) = &display_name {
            self.auth.update_display_name(name).await?;
        }

        let mut fields = Fields::new();
        if let Some(name) = &display_name {
            fields.insert("displayName".to_owned(), json!(name));
        }
        if let Some(bio) = &update.bio {
            fields.insert("bio".to_owned(), json!(bio));
        }
        if let Some(uri) = &avatar {
            fields.insert("photoURL".to_owned(), json!(uri));
        }
        self.store
            .update(&users_root().doc(user.uid.as_str()), fields)
            .await?;
        info!(user = %user.uid, "profile updated");

        self.profile(&user.uid).await
    }

    /// The name and avatar to stamp onto a post or comment written by this
    /// account.
    pub(crate) async fn author_identity(&self, user: &AuthUser) -> (String, String) {
        let username = user.visible_name();
        let avatar = match self.store.get(&users_root().doc(user.uid.as_str())).await {
            Ok(Some(doc)) => ProfileRecord::from_fields(&doc.fields)
                .photo_url
                .unwrap_or_else(|| placeholder::avatar_placeholder(&username)),
            // A missing or unreadable profile must not block the write.
            _ => placeholder::avatar_placeholder(&username),
        };
        (username, avatar)
    }
}

fn validate_display_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyDisplayName.into());
    }
    let chars = name.chars().count();
    if chars > MAX_DISPLAY_NAME_CHARS {
        return Err(ValidationError::DisplayNameTooLong {
            chars,
            limit: MAX_DISPLAY_NAME_CHARS,
        }
        .into());
    }
    Ok(name.to_owned())
}

fn validate_bio(bio: &str) -> Result<()> {
    let chars = bio.chars().count();
    if chars > MAX_BIO_CHARS {
        return Err(ValidationError::BioTooLong {
            chars,
            limit: MAX_BIO_CHARS,
        }
        .into());
    }
    Ok(())
}
