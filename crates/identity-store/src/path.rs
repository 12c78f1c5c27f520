//! Document addressing.
//!
//! Every document the chat core touches lives under `apps/{appId}/`. A path
//! is built from typed ids and rendered with `/` separators, so no segment
//! may be empty or contain `/`.

use std::fmt;

use crate::error::{StoreError, StoreResult};
use crate::types::{AppId, ChannelId, IdentityId};

/// A validated address in the document store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DocumentPath {
    /// `apps/{appId}/users/{uid}/profile`
    Profile { app: AppId, user: IdentityId },
    /// `apps/{appId}/directory/{uid}`
    DirectoryEntry { app: AppId, user: IdentityId },
    /// `apps/{appId}/directory`
    Directory { app: AppId },
    /// `apps/{appId}/channels/{channelId}/messages`
    Messages { app: AppId, channel: ChannelId },
}

fn check_segment(kind: &str, value: &str) -> StoreResult<()> {
    if value.is_empty() {
        return Err(StoreError::InvalidPath(format!("{} segment is empty", kind)));
    }
    if value.contains('/') {
        return Err(StoreError::InvalidPath(format!(
            "{} segment {:?} contains '/'",
            kind, value
        )));
    }
    Ok(())
}

impl DocumentPath {
    pub fn profile(app: &AppId, user: &IdentityId) -> StoreResult<Self> {
        check_segment("app", app.as_str())?;
        check_segment("user", user.as_str())?;
        Ok(Self::Profile {
            app: app.clone(),
            user: user.clone(),
        })
    }

    pub fn directory_entry(app: &AppId, user: &IdentityId) -> StoreResult<Self> {
        check_segment("app", app.as_str())?;
        check_segment("user", user.as_str())?;
        Ok(Self::DirectoryEntry {
            app: app.clone(),
            user: user.clone(),
        })
    }

    pub fn directory(app: &AppId) -> StoreResult<Self> {
        check_segment("app", app.as_str())?;
        Ok(Self::Directory { app: app.clone() })
    }

    pub fn messages(app: &AppId, channel: &ChannelId) -> StoreResult<Self> {
        check_segment("app", app.as_str())?;
        check_segment("channel", channel.as_str())?;
        Ok(Self::Messages {
            app: app.clone(),
            channel: channel.clone(),
        })
    }

    /// Parses a rendered path back into its typed form.
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let segments: Vec<&str> = raw.split('/').collect();
        let invalid = || StoreError::InvalidPath(format!("unrecognised path {:?}", raw));

        match segments.as_slice() {
            ["apps", app, "users", user, "profile"] => {
                Self::profile(&AppId::from(*app), &IdentityId::from(*user))
            }
            ["apps", app, "directory", user] => {
                Self::directory_entry(&AppId::from(*app), &IdentityId::from(*user))
            }
            ["apps", app, "directory"] => Self::directory(&AppId::from(*app)),
            ["apps", app, "channels", channel, "messages"] => {
                Self::messages(&AppId::from(*app), &ChannelId::from(*channel))
            }
            _ => Err(invalid()),
        }
    }

    pub fn app(&self) -> &AppId {
        match self {
            Self::Profile { app, .. }
            | Self::DirectoryEntry { app, .. }
            | Self::Directory { app }
            | Self::Messages { app, .. } => app,
        }
    }

    /// The collection a single document belongs to, if any.
    pub fn collection(&self) -> Option<DocumentPath> {
        match self {
            Self::DirectoryEntry { app, .. } => Some(Self::Directory { app: app.clone() }),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profile { app, user } => write!(f, "apps/{}/users/{}/profile", app, user),
            Self::DirectoryEntry { app, user } => write!(f, "apps/{}/directory/{}", app, user),
            Self::Directory { app } => write!(f, "apps/{}/directory", app),
            Self::Messages { app, channel } => {
                write!(f, "apps/{}/channels/{}/messages", app, channel)
            }
        }
    }
}
