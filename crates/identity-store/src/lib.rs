//! # Identity store
//!
//! The document-store contract the chat core relies on, plus two
//! implementations of it.
//!
//! ## Layout
//!
//! ```text
//! apps/{appId}/users/{uid}/profile               private profile (read, upsert)
//! apps/{appId}/directory/{uid}                   public entry (upsert, live query)
//! apps/{appId}/channels/{channelId}/messages     messages (append, live query by sentAt)
//! ```
//!
//! ## Principles
//!
//! - The store owns message ids and every timestamp. Clients never supply either.
//! - Live queries deliver whole [`Snapshot`]s, never deltas. Redelivery is allowed.
//! - Dropping or closing a [`LiveSubscription`] ends delivery for it.
//!
//! ## Crate Structure
//!
//! - [`types`] - ids, records and snapshots
//! - [`path`] - document addressing
//! - [`store`] - the [`IdentityStore`] trait
//! - [`live`] - subscription fan-out
//! - [`memory`] - in-process store used by tests and embedders
//! - [`supabase`] - PostgREST-backed store with polling live queries

pub mod error;
pub mod live;
pub mod memory;
pub mod path;
pub mod store;
pub mod supabase;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use live::{LiveHub, LiveSubscription};
pub use memory::MemoryIdentityStore;
pub use path::DocumentPath;
pub use store::IdentityStore;
pub use supabase::{AccessTokenSource, StaticAccessToken, SupabaseIdentityStore};
pub use types::{
    AppId, ChannelId, Identity, IdentityId, Message, MessageId, NewMessage, ProfileDraft,
    ServerTimestamp, Snapshot, DEFAULT_AVATAR_TAG,
};
