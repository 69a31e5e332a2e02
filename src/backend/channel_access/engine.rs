/**
 * Channel-Access Propagation Engine
 *
 * Maintains the denormalized `channel_access` index: one row per
 * (user, channel) the user can see. Every entry point recomputes the full
 * set for its scope and replaces the stored rows with exactly that set, so
 * each call is idempotent and safe to re-run.
 *
 * # Visibility Rules
 *
 * - `public` - every active organization member
 * - `private` / `direct` / `single` - explicit channel members that are still
 *   active organization members
 * - `thread` - the parent channel's current access rows, intersected with
 *   active membership; threads never nest, so a thread under a thread is empty
 * - deleted or missing channels - empty
 */

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::backend::error::SyncError;
use crate::backend::store::{AccessDiff, AccessStore, ChatStore, DirectoryStore, Stores};
use crate::shared::models::{Channel, ChannelType};

pub struct ChannelAccessEngine {
    chat: Arc<dyn ChatStore>,
    directory: Arc<dyn DirectoryStore>,
    access: Arc<dyn AccessStore>,
}

impl ChannelAccessEngine {
    pub fn new(
        chat: Arc<dyn ChatStore>,
        directory: Arc<dyn DirectoryStore>,
        access: Arc<dyn AccessStore>,
    ) -> Self {
        Self {
            chat,
            directory,
            access,
        }
    }

    pub fn from_stores(stores: &Stores) -> Self {
        Self::new(
            stores.chat.clone(),
            stores.directory.clone(),
            stores.access.clone(),
        )
    }

    async fn active_members(&self, organization_id: Uuid) -> Result<HashSet<Uuid>, SyncError> {
        Ok(self
            .directory
            .list_active_member_ids(organization_id)
            .await?
            .into_iter()
            .collect())
    }

    /// Users that should see `channel`, or an empty set when it has no
    /// resolvable topology
    async fn compute_members(&self, channel: &Channel) -> Result<HashSet<Uuid>, SyncError> {
        if channel.is_deleted() {
            return Ok(HashSet::new());
        }
        let active = self.active_members(channel.organization_id).await?;

        let members = match channel.channel_type {
            ChannelType::Public => active,
            ChannelType::Private | ChannelType::Direct | ChannelType::Single => self
                .chat
                .list_channel_member_ids(channel.id)
                .await?
                .into_iter()
                .filter(|user_id| active.contains(user_id))
                .collect(),
            ChannelType::Thread => {
                let Some(parent_id) = channel.parent_channel_id else {
                    return Ok(HashSet::new());
                };
                let parent = match self.chat.find_channel(parent_id).await? {
                    Some(parent) if !parent.is_deleted() => parent,
                    _ => return Ok(HashSet::new()),
                };
                if parent.channel_type == ChannelType::Thread {
                    tracing::warn!(
                        "[ChannelAccess] Thread {} is nested under thread {}; denying access",
                        channel.id,
                        parent.id
                    );
                    return Ok(HashSet::new());
                }
                self.access
                    .list_channel_user_ids(parent.id)
                    .await?
                    .into_iter()
                    .filter(|user_id| active.contains(user_id))
                    .collect()
            }
        };
        Ok(members)
    }

    /// Recompute one channel's access rows
    pub async fn sync_channel(&self, channel_id: Uuid) -> Result<AccessDiff, SyncError> {
        let channel = self.chat.find_channel(channel_id).await?;
        let (organization_id, members) = match &channel {
            Some(channel) => (
                Some(channel.organization_id),
                self.compute_members(channel).await?,
            ),
            None => (None, HashSet::new()),
        };

        let diff = self
            .access
            .replace_channel_access(channel_id, organization_id, &members)
            .await?;
        tracing::debug!(
            "[ChannelAccess] Channel {}: {} users (+{} / -{})",
            channel_id,
            members.len(),
            diff.inserted,
            diff.deleted
        );
        Ok(diff)
    }

    /// Recompute every direct thread child of a channel
    pub async fn sync_child_threads(&self, parent_channel_id: Uuid) -> Result<AccessDiff, SyncError> {
        let mut total = AccessDiff::default();
        for thread in self.chat.list_child_threads(parent_channel_id).await? {
            let diff = self.sync_channel(thread.id).await?;
            total.inserted += diff.inserted;
            total.deleted += diff.deleted;
        }
        Ok(total)
    }

    /// Recompute a channel, then cascade to its threads
    pub async fn sync_channel_and_threads(&self, channel_id: Uuid) -> Result<AccessDiff, SyncError> {
        let mut total = self.sync_channel(channel_id).await?;
        let threads = self.sync_child_threads(channel_id).await?;
        total.inserted += threads.inserted;
        total.deleted += threads.deleted;
        tracing::info!(
            "[ChannelAccess] Synced channel {} and threads (+{} / -{})",
            channel_id,
            total.inserted,
            total.deleted
        );
        Ok(total)
    }

    /// Recompute every channel one user can see within an organization, in one replacement
    pub async fn sync_user_in_organization(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<AccessDiff, SyncError> {
        if !self
            .directory
            .is_active_member(organization_id, user_id)
            .await?
        {
            let diff = self
                .access
                .replace_user_access(user_id, organization_id, &HashSet::new())
                .await?;
            tracing::info!(
                "[ChannelAccess] User {} is not an active member of {}; removed {} rows",
                user_id,
                organization_id,
                diff.deleted
            );
            return Ok(diff);
        }

        let channels = self.chat.list_organization_channels(organization_id).await?;
        let memberships: HashSet<Uuid> = self
            .chat
            .list_member_channel_ids(user_id, organization_id)
            .await?
            .into_iter()
            .collect();

        let mut visible: HashSet<Uuid> = channels
            .iter()
            .filter(|channel| channel.channel_type != ChannelType::Thread)
            .filter(|channel| {
                channel.channel_type == ChannelType::Public || memberships.contains(&channel.id)
            })
            .map(|channel| channel.id)
            .collect();

        let threads: Vec<Uuid> = channels
            .iter()
            .filter(|channel| channel.channel_type == ChannelType::Thread)
            .filter(|channel| {
                channel
                    .parent_channel_id
                    .map(|parent| visible.contains(&parent))
                    .unwrap_or(false)
            })
            .map(|channel| channel.id)
            .collect();
        visible.extend(threads);

        let diff = self
            .access
            .replace_user_access(user_id, organization_id, &visible)
            .await?;
        tracing::info!(
            "[ChannelAccess] User {} in {}: {} channels (+{} / -{})",
            user_id,
            organization_id,
            visible.len(),
            diff.inserted,
            diff.deleted
        );
        Ok(diff)
    }
}
