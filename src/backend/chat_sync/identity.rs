//! External author resolution.
//!
//! An external account linked to a real internal user maps to that user.
//! Anyone else gets a shadow user with the synthetic external id
//! `<provider>-user-<external user id>`, upserted and made a member of the
//! connection's organization.

use uuid::Uuid;

use super::inbound::ExternalAuthor;
use super::ChatSyncWorker;
use crate::backend::error::SyncError;
use crate::shared::models::{ShadowUserProfile, SyncConnection, User};

/// Display name used when the platform sent no author metadata
pub const FALLBACK_DISPLAY_NAME: &str = "External User";

pub fn shadow_external_id(provider: &str, external_user_id: &str) -> String {
    format!("{}-user-{}", provider, external_user_id)
}

/// Whether `user` is a shadow user created for `provider`
pub fn is_shadow_user(provider: &str, user: &User) -> bool {
    shadow_external_user_id(provider, user).is_some()
}

/// The platform account id behind a shadow user of `provider`
pub fn shadow_external_user_id<'a>(provider: &str, user: &'a User) -> Option<&'a str> {
    user.external_id
        .strip_prefix(provider)
        .and_then(|rest| rest.strip_prefix("-user-"))
        .filter(|id| !id.is_empty())
}

pub fn shadow_profile(provider: &str, author: &ExternalAuthor) -> ShadowUserProfile {
    let display_name = author
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let avatar_url = author.avatar_url.as_deref().filter(|url| !url.is_empty());

    ShadowUserProfile {
        external_id: shadow_external_id(provider, &author.external_user_id),
        display_name: display_name.unwrap_or(FALLBACK_DISPLAY_NAME).to_string(),
        avatar_url: avatar_url.unwrap_or_default().to_string(),
        sync_avatar: avatar_url.is_some(),
    }
}

impl ChatSyncWorker {
    /// Internal user id to attribute an external author's content to
    pub(crate) async fn resolve_author(
        &self,
        connection: &SyncConnection,
        author: &ExternalAuthor,
    ) -> Result<Uuid, SyncError> {
        if let Some(user_id) = self
            .directory
            .find_linked_user(&connection.provider, &author.external_user_id)
            .await?
        {
            return Ok(user_id);
        }

        let user = self
            .directory
            .upsert_user_by_external_id(shadow_profile(&connection.provider, author))
            .await?;
        self.directory
            .ensure_organization_member(connection.organization_id, user.id)
            .await?;
        Ok(user.id)
    }
}
