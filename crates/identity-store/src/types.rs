//! Core types for the identity store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Avatar tag given to freshly completed profiles.
pub const DEFAULT_AVATAR_TAG: &str = "emerald";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Creates an id from an existing string.
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Returns the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Opaque, stable identity id assigned by the challenge provider.
    IdentityId
);

string_id!(
    /// Message id assigned by the store.
    MessageId
);

string_id!(
    /// Deterministic conversation id derived from two identity ids.
    ChannelId
);

string_id!(
    /// Namespace all documents live under.
    AppId
);

impl MessageId {
    /// Creates a new random message ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

/// Timestamp assigned by the store.
///
/// Clients read these; they never mint them from their own clock.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerTimestamp(DateTime<Utc>);

impl ServerTimestamp {
    /// Wraps a timestamp produced by the backend.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for ServerTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// A user's profile as stored privately and mirrored into the directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: IdentityId,
    pub display_name: String,
    pub phone: String,
    pub last_seen_at: ServerTimestamp,
    pub avatar_tag: String,
}

/// What a client writes when completing a profile.
///
/// The store answers with the [`Identity`] carrying its own `last_seen_at`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDraft {
    pub id: IdentityId,
    pub display_name: String,
    pub phone: String,
    pub avatar_tag: String,
}

impl ProfileDraft {
    /// Draft with the default avatar tag. `display_name` is stored trimmed.
    pub fn new(id: IdentityId, display_name: &str, phone: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.trim().to_string(),
            phone: phone.into(),
            avatar_tag: DEFAULT_AVATAR_TAG.to_string(),
        }
    }
}

/// A message in a channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub sender_id: IdentityId,
    pub sent_at: ServerTimestamp,
}

/// A message to be appended.
///
/// The id and `sent_at` are assigned by the store during the append.
/// Callers must NOT provide either.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub text: String,
    pub sender_id: IdentityId,
}

/// One delivery of a live query: the full result set at some point in time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    /// Increases with every change the store observed. Redeliveries repeat it.
    pub sequence: u64,
    pub items: Vec<T>,
}

impl<T> Snapshot<T> {
    pub fn new(sequence: u64, items: Vec<T>) -> Self {
        Self { sequence, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
