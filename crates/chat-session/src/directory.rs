//! Live roster of the other users of an app.

use identity_store::{Identity, IdentityId, LiveSubscription, Snapshot};
use phone_auth::SessionContext;
use tracing::{debug, info};

use crate::error::{ChatError, ChatResult};

/// Directory entries of everyone except the viewing user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    entries: Vec<Identity>,
}

impl Roster {
    fn from_snapshot(viewer: &IdentityId, snapshot: Snapshot<Identity>) -> Self {
        Self {
            entries: snapshot
                .items
                .into_iter()
                .filter(|entry| &entry.id != viewer)
                .collect(),
        }
    }

    pub fn entries(&self) -> &[Identity] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.entries.iter()
    }

    pub fn contains(&self, id: &IdentityId) -> bool {
        self.entries.iter().any(|entry| &entry.id == id)
    }

    pub fn get(&self, id: &IdentityId) -> Option<&Identity> {
        self.entries.iter().find(|entry| &entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered for display: by name, then id.
    pub fn sorted_by_name(&self) -> Vec<&Identity> {
        let mut sorted: Vec<&Identity> = self.entries.iter().collect();
        sorted.sort_by(|a, b| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        sorted
    }
}

/// Watches the public directory for a signed-in user.
#[derive(Debug)]
pub struct DirectoryService {
    ctx: SessionContext,
    subscription: Option<LiveSubscription<Identity>>,
    roster: Roster,
}

impl DirectoryService {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            subscription: None,
            roster: Roster::default(),
        }
    }

    /// Opens the directory subscription. Starting twice is a no-op.
    pub async fn start(&mut self) -> ChatResult<()> {
        if !self.ctx.is_active() {
            return Err(ChatError::NotAuthenticated);
        }
        if self.subscription.is_some() {
            return Ok(());
        }

        let subscription = self
            .ctx
            .store()
            .subscribe_directory(self.ctx.app_id())
            .await?;
        self.subscription = Some(subscription);

        info!(user_id = %self.ctx.user_id(), "Directory subscription started");
        Ok(())
    }

    /// Waits for the next roster.
    ///
    /// Returns `None` when stopped, signed out, or the store ended the stream.
    pub async fn next_roster(&mut self) -> Option<&Roster> {
        if !self.ctx.is_active() {
            self.stop();
            return None;
        }
        let subscription = self.subscription.as_mut()?;

        let snapshot = tokio::select! {
            biased;
            _ = self.ctx.revoked() => None,
            snapshot = subscription.next() => snapshot,
        };

        let Some(snapshot) = snapshot else {
            self.stop();
            return None;
        };

        self.roster = Roster::from_snapshot(self.ctx.user_id(), snapshot);
        debug!(entries = self.roster.len(), "Roster updated");
        Some(&self.roster)
    }

    /// The last roster delivered by [`next_roster`](Self::next_roster).
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn is_running(&self) -> bool {
        self.subscription.is_some()
    }

    /// Releases the subscription. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
            info!(user_id = %self.ctx.user_id(), "Directory subscription stopped");
        }
    }
}

impl Drop for DirectoryService {
    fn drop(&mut self) {
        self.stop();
    }
}
