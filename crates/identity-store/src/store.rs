//! The store contract.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::live::LiveSubscription;
use crate::types::{
    AppId, ChannelId, Identity, IdentityId, Message, NewMessage, ProfileDraft, ServerTimestamp,
};

/// Remote document store holding profiles, the public directory and
/// channel messages.
///
/// Implementations must:
/// - assign `last_seen_at`, message ids and `sent_at` themselves
/// - deliver message snapshots ordered ascending by `sent_at`
/// - deliver an initial snapshot to every new subscription
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Reads the private profile. `Ok(None)` when none was written yet.
    async fn get_profile(&self, app: &AppId, user: &IdentityId) -> StoreResult<Option<Identity>>;

    /// Creates or replaces the private profile and returns it as stored.
    async fn upsert_profile(&self, app: &AppId, draft: &ProfileDraft) -> StoreResult<Identity>;

    /// Creates or replaces the public directory entry for `identity.id`.
    async fn upsert_directory_entry(&self, app: &AppId, identity: &Identity) -> StoreResult<()>;

    /// Live query over every directory entry of `app`.
    async fn subscribe_directory(&self, app: &AppId) -> StoreResult<LiveSubscription<Identity>>;

    /// Appends a message to `channel`. The returned message carries the
    /// store-assigned id and `sent_at`.
    async fn append_message(
        &self,
        app: &AppId,
        channel: &ChannelId,
        message: NewMessage,
    ) -> StoreResult<Message>;

    /// Live query over the messages of `channel`, ordered by `sent_at`.
    async fn subscribe_messages(
        &self,
        app: &AppId,
        channel: &ChannelId,
    ) -> StoreResult<LiveSubscription<Message>>;

    /// Refreshes `last_seen_at` on the profile and directory entry.
    ///
    /// Fails with `NotFound` when the profile does not exist.
    async fn touch_last_seen(&self, app: &AppId, user: &IdentityId) -> StoreResult<ServerTimestamp>;
}
