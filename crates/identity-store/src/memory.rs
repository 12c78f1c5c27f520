//! In-process identity store.
//!
//! Behaves like the remote store as far as the chat core can observe:
//! server-assigned ids and strictly increasing timestamps, ordered message
//! snapshots, an initial snapshot on subscribe. It adds hooks for tests:
//! injected write failures and snapshot redelivery.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{StoreError, StoreResult};
use crate::live::{LiveHub, LiveSubscription};
use crate::path::DocumentPath;
use crate::store::IdentityStore;
use crate::types::{
    AppId, ChannelId, Identity, IdentityId, Message, MessageId, NewMessage, ProfileDraft,
    ServerTimestamp, Snapshot,
};

#[derive(Default)]
struct MemoryState {
    profiles: HashMap<DocumentPath, Identity>,
    /// Directory collection path -> entries keyed by user id
    directories: HashMap<DocumentPath, BTreeMap<IdentityId, Identity>>,
    /// Messages collection path -> messages in append order
    channels: HashMap<DocumentPath, Vec<Message>>,
    last_timestamp: Option<DateTime<Utc>>,
    sequence: u64,
    failing_writes: u32,
    failing_reads: u32,
    writes: u64,
}

impl MemoryState {
    /// Server clock: never repeats and never goes backwards.
    fn next_timestamp(&mut self) -> ServerTimestamp {
        let now = Utc::now();
        let at = match self.last_timestamp {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(at);
        ServerTimestamp::from_datetime(at)
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn check_write(&mut self, path: &DocumentPath) -> StoreResult<()> {
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            tracing::debug!(path = %path, "injected write failure");
            return Err(StoreError::WriteRejected(format!(
                "injected failure writing {}",
                path
            )));
        }
        self.writes += 1;
        Ok(())
    }

    fn check_read(&mut self, path: &DocumentPath) -> StoreResult<()> {
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            tracing::debug!(path = %path, "injected read failure");
            return Err(StoreError::Unavailable(format!(
                "injected failure reading {}",
                path
            )));
        }
        Ok(())
    }

    fn directory_snapshot(&self, collection: &DocumentPath) -> Vec<Identity> {
        self.directories
            .get(collection)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }

    fn message_snapshot(&self, collection: &DocumentPath) -> Vec<Message> {
        let mut messages = self.channels.get(collection).cloned().unwrap_or_default();
        messages.sort_by(|a, b| a.sent_at.cmp(&b.sent_at).then_with(|| a.id.cmp(&b.id)));
        messages
    }
}

/// Identity store kept entirely in memory.
#[derive(Default)]
pub struct MemoryIdentityStore {
    state: Mutex<MemoryState>,
    directory_hub: LiveHub<Identity>,
    message_hub: LiveHub<Message>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` writes fail with `WriteRejected`.
    pub fn fail_next_writes(&self, count: u32) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.failing_writes = count;
    }

    /// Makes the next `count` profile reads fail with `Unavailable`.
    pub fn fail_next_reads(&self, count: u32) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.failing_reads = count;
    }

    /// Number of writes that were applied.
    pub fn write_count(&self) -> u64 {
        self.state.lock().expect("lock poisoned").writes
    }

    /// Sends the last snapshot of a live query again, as an at-least-once
    /// backend may. Returns false if nothing was delivered for it yet.
    pub fn redeliver(&self, path: &DocumentPath) -> bool {
        let key = path.to_string();
        match path {
            DocumentPath::Directory { .. } => self.directory_hub.redeliver(&key),
            DocumentPath::Messages { .. } => self.message_hub.redeliver(&key),
            _ => false,
        }
    }

    /// Current public directory entry for `user`, if any.
    pub fn directory_entry(&self, app: &AppId, user: &IdentityId) -> StoreResult<Option<Identity>> {
        let collection = DocumentPath::directory(app)?;
        let state = self.state.lock().expect("lock poisoned");
        Ok(state
            .directories
            .get(&collection)
            .and_then(|entries| entries.get(user))
            .cloned())
    }

    /// Every message stored in `channel`, ordered by `sent_at`.
    pub fn channel_messages(&self, app: &AppId, channel: &ChannelId) -> StoreResult<Vec<Message>> {
        let collection = DocumentPath::messages(app, channel)?;
        let state = self.state.lock().expect("lock poisoned");
        Ok(state.message_snapshot(&collection))
    }

    fn notify_directory(&self, state: &mut MemoryState, collection: &DocumentPath) {
        let items = state.directory_snapshot(collection);
        let sequence = state.next_sequence();
        tracing::debug!(path = %collection, sequence, entries = items.len(), "directory snapshot");
        self.directory_hub
            .notify(&collection.to_string(), Snapshot::new(sequence, items));
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn get_profile(&self, app: &AppId, user: &IdentityId) -> StoreResult<Option<Identity>> {
        let path = DocumentPath::profile(app, user)?;
        let mut state = self.state.lock().expect("lock poisoned");
        state.check_read(&path)?;
        Ok(state.profiles.get(&path).cloned())
    }

    async fn upsert_profile(&self, app: &AppId, draft: &ProfileDraft) -> StoreResult<Identity> {
        let path = DocumentPath::profile(app, &draft.id)?;
        let mut state = self.state.lock().expect("lock poisoned");
        state.check_write(&path)?;

        let identity = Identity {
            id: draft.id.clone(),
            display_name: draft.display_name.clone(),
            phone: draft.phone.clone(),
            last_seen_at: state.next_timestamp(),
            avatar_tag: draft.avatar_tag.clone(),
        };
        state.profiles.insert(path, identity.clone());
        Ok(identity)
    }

    async fn upsert_directory_entry(&self, app: &AppId, identity: &Identity) -> StoreResult<()> {
        let path = DocumentPath::directory_entry(app, &identity.id)?;
        let collection = DocumentPath::directory(app)?;
        let mut state = self.state.lock().expect("lock poisoned");
        state.check_write(&path)?;

        state
            .directories
            .entry(collection.clone())
            .or_default()
            .insert(identity.id.clone(), identity.clone());
        self.notify_directory(&mut state, &collection);
        Ok(())
    }

    async fn subscribe_directory(&self, app: &AppId) -> StoreResult<LiveSubscription<Identity>> {
        let collection = DocumentPath::directory(app)?;
        let state = self.state.lock().expect("lock poisoned");
        let initial = Snapshot::new(state.sequence, state.directory_snapshot(&collection));
        Ok(self
            .directory_hub
            .subscribe(&collection.to_string(), Some(initial)))
    }

    async fn append_message(
        &self,
        app: &AppId,
        channel: &ChannelId,
        message: NewMessage,
    ) -> StoreResult<Message> {
        let collection = DocumentPath::messages(app, channel)?;
        let mut state = self.state.lock().expect("lock poisoned");
        state.check_write(&collection)?;

        let stored = Message {
            id: MessageId::new(),
            text: message.text,
            sender_id: message.sender_id,
            sent_at: state.next_timestamp(),
        };
        state
            .channels
            .entry(collection.clone())
            .or_default()
            .push(stored.clone());

        let items = state.message_snapshot(&collection);
        let sequence = state.next_sequence();
        tracing::debug!(path = %collection, sequence, messages = items.len(), "message snapshot");
        self.message_hub
            .notify(&collection.to_string(), Snapshot::new(sequence, items));

        Ok(stored)
    }

    async fn subscribe_messages(
        &self,
        app: &AppId,
        channel: &ChannelId,
    ) -> StoreResult<LiveSubscription<Message>> {
        let collection = DocumentPath::messages(app, channel)?;
        let state = self.state.lock().expect("lock poisoned");
        let initial = Snapshot::new(state.sequence, state.message_snapshot(&collection));
        Ok(self
            .message_hub
            .subscribe(&collection.to_string(), Some(initial)))
    }

    async fn touch_last_seen(&self, app: &AppId, user: &IdentityId) -> StoreResult<ServerTimestamp> {
        let path = DocumentPath::profile(app, user)?;
        let collection = DocumentPath::directory(app)?;
        let mut state = self.state.lock().expect("lock poisoned");
        if !state.profiles.contains_key(&path) {
            return Err(StoreError::NotFound(path.to_string()));
        }
        state.check_write(&path)?;

        let at = state.next_timestamp();
        if let Some(profile) = state.profiles.get_mut(&path) {
            profile.last_seen_at = at;
        }
        let mirrored = state
            .directories
            .get_mut(&collection)
            .and_then(|entries| entries.get_mut(user))
            .map(|entry| entry.last_seen_at = at)
            .is_some();
        if mirrored {
            self.notify_directory(&mut state, &collection);
        }
        Ok(at)
    }
}
