//! One-to-one conversations.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use identity_store::{ChannelId, IdentityId, LiveSubscription, Message, NewMessage};
use phone_auth::SessionContext;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::channel::{canonicalize, is_addressable, CHANNEL_SEPARATOR};
use crate::composer::Composer;
use crate::error::{ChatError, ChatResult};
use crate::message_log::MessageLog;

/// An open conversation between the signed-in user and one peer.
#[derive(Debug)]
pub struct ChatSession {
    ctx: SessionContext,
    peer: IdentityId,
    channel: ChannelId,
    subscription: Option<LiveSubscription<Message>>,
    log: MessageLog,
}

impl ChatSession {
    /// Subscribes to the channel shared with `peer`.
    pub async fn open(ctx: &SessionContext, peer: &IdentityId) -> ChatResult<Self> {
        if !ctx.is_active() {
            return Err(ChatError::NotAuthenticated);
        }
        if peer == ctx.user_id() {
            return Err(ChatError::Validation(
                "cannot open a conversation with yourself".to_string(),
            ));
        }
        if !is_addressable(ctx.user_id()) || !is_addressable(peer) {
            return Err(ChatError::Validation(format!(
                "identity ids must be non-empty and must not contain '{}'",
                CHANNEL_SEPARATOR
            )));
        }

        let channel = canonicalize(ctx.user_id(), peer);
        let subscription = ctx
            .store()
            .subscribe_messages(ctx.app_id(), &channel)
            .await?;

        info!(channel = %channel, "Chat session opened");
        Ok(Self {
            ctx: ctx.clone(),
            peer: peer.clone(),
            channel,
            subscription: Some(subscription),
            log: MessageLog::new(),
        })
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn peer(&self) -> &IdentityId {
        &self.peer
    }

    /// Messages received so far, oldest first.
    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn is_open(&self) -> bool {
        self.subscription.is_some()
    }

    /// Waits for the next snapshot and merges it.
    ///
    /// Returns the ordered messages, or `None` once closed or signed out.
    pub async fn next_update(&mut self) -> Option<&[Message]> {
        if !self.ctx.is_active() {
            self.close();
            return None;
        }
        let subscription = self.subscription.as_mut()?;

        let snapshot = tokio::select! {
            biased;
            _ = self.ctx.revoked() => None,
            snapshot = subscription.next() => snapshot,
        };

        let Some(snapshot) = snapshot else {
            self.close();
            return None;
        };

        let added = self.log.merge(snapshot);
        debug!(channel = %self.channel, added, total = self.log.len(), "Messages merged");
        Some(self.log.messages())
    }

    /// Starts writing `text` to the channel.
    ///
    /// The write runs as a task on the current Tokio runtime; the returned
    /// [`PendingSend`] resolves to the stored message or to
    /// [`ChatError::SendFailed`]. Called outside a runtime, it fails with
    /// [`ChatError::SendFailed`] and nothing is written.
    pub fn send(&self, text: &str) -> ChatResult<PendingSend> {
        self.check_sendable(text)?;
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| ChatError::SendFailed {
                text: text.to_string(),
                reason: e.to_string(),
            })?;

        let store = self.ctx.store().clone();
        let app_id = self.ctx.app_id().clone();
        let channel = self.channel.clone();
        let message = NewMessage {
            text: text.to_string(),
            sender_id: self.ctx.user_id().clone(),
        };
        let unsent = text.to_string();

        let (sender, receiver) = oneshot::channel();
        runtime.spawn(async move {
            let result = match store.append_message(&app_id, &channel, message).await {
                Ok(stored) => {
                    info!(channel = %channel, message_id = %stored.id, "Message sent");
                    Ok(stored)
                }
                Err(e) => {
                    warn!(channel = %channel, error = %e, "Message write failed");
                    Err(ChatError::SendFailed {
                        text: unsent,
                        reason: e.to_string(),
                    })
                }
            };
            let _ = sender.send(result);
        });

        Ok(PendingSend {
            receiver,
            text: text.to_string(),
        })
    }

    /// Sends the composer's text and clears it right away.
    ///
    /// Rejected input stays in the composer, and so does text that could
    /// not be handed to a runtime.
    pub fn send_draft(&self, composer: &mut Composer) -> ChatResult<PendingSend> {
        self.check_sendable(composer.text())?;
        let text = composer.take();
        self.send(&text).map_err(|e| {
            composer.restore(&e);
            e
        })
    }

    /// Releases the subscription. Idempotent.
    ///
    /// Sending is still possible afterwards; nothing more is received.
    pub fn close(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
            info!(channel = %self.channel, "Chat session closed");
        }
    }

    fn check_sendable(&self, text: &str) -> ChatResult<()> {
        if !self.ctx.is_active() {
            return Err(ChatError::NotAuthenticated);
        }
        if text.trim().is_empty() {
            return Err(ChatError::Validation(
                "message must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// An in-flight message write.
#[derive(Debug)]
pub struct PendingSend {
    receiver: oneshot::Receiver<ChatResult<Message>>,
    text: String,
}

impl PendingSend {
    /// The text being sent.
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Future for PendingSend {
    type Output = ChatResult<Message>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ChatError::SendFailed {
                text: this.text.clone(),
                reason: "send task ended before the write completed".to_string(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}
