//! The signed-in session handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use identity_store::{AppId, Identity, IdentityId, IdentityStore};
use tokio::sync::Notify;

struct SessionInner {
    app_id: AppId,
    identity: Identity,
    store: Arc<dyn IdentityStore>,
    active: AtomicBool,
    revoked: Notify,
}

/// Proof of a `Ready` sign-in, passed to everything that touches chat data.
///
/// Clones share one gate. [`AuthController::sign_out`](crate::AuthController::sign_out)
/// revokes it and every clone reports `is_active() == false` from then on.
///
/// The only way to get one is [`AuthController::session`](crate::AuthController::session);
/// other crates cannot build one for an arbitrary identity:
///
/// ```compile_fail
/// use std::sync::Arc;
/// use identity_store::{AppId, Identity, MemoryIdentityStore};
/// use phone_auth::SessionContext;
///
/// fn forge(identity: Identity) -> SessionContext {
///     SessionContext::new(AppId::from("app"), identity, Arc::new(MemoryIdentityStore::new()))
/// }
/// ```
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionInner>,
}

impl SessionContext {
    pub(crate) fn new(app_id: AppId, identity: Identity, store: Arc<dyn IdentityStore>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                app_id,
                identity,
                store,
                active: AtomicBool::new(true),
                revoked: Notify::new(),
            }),
        }
    }

    pub fn app_id(&self) -> &AppId {
        &self.inner.app_id
    }

    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    pub fn user_id(&self) -> &IdentityId {
        &self.inner.identity.id
    }

    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.inner.store
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Ends this session for every clone. Idempotent.
    pub fn revoke(&self) {
        if self.inner.active.swap(false, Ordering::AcqRel) {
            tracing::info!(user_id = %self.user_id(), "session revoked");
            self.inner.revoked.notify_waiters();
        }
    }

    /// Completes once the session is revoked.
    pub async fn revoked(&self) {
        loop {
            let notified = self.inner.revoked.notified();
            if !self.is_active() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("app_id", self.app_id())
            .field("user_id", self.user_id())
            .field("active", &self.is_active())
            .finish()
    }
}
