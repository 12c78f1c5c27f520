//! # Chat session
//!
//! What a signed-in user does: watch the directory of other users and hold
//! one-to-one conversations with them.
//!
//! Everything here takes a [`SessionContext`] obtained from
//! [`phone_auth::AuthController::session`] and refuses to work once that
//! context is revoked by sign-out.
//!
//! ```text
//! AuthController ──Ready──► SessionContext
//!                                │
//!              ┌─────────────────┴─────────────────┐
//!              ▼                                   ▼
//!      DirectoryService ──selected peer──►    ChatSession
//!      (roster without self)                (canonical channel,
//!                                            ordered MessageLog,
//!                                            PendingSend)
//! ```

mod channel;
mod composer;
mod directory;
mod error;
mod message_log;
mod session;

pub use channel::{canonicalize, is_addressable, CHANNEL_SEPARATOR};
pub use composer::Composer;
pub use directory::{DirectoryService, Roster};
pub use error::{ChatError, ChatResult};
pub use message_log::MessageLog;
pub use phone_auth::SessionContext;
pub use session::{ChatSession, PendingSend};
