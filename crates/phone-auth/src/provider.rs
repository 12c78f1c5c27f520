//! The challenge-provider contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use identity_store::IdentityId;
use serde::{Deserialize, Serialize};

use crate::error::AuthResult;

/// A dialling country. The full country list lives with the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    pub name: String,
    /// `+` followed by digits, e.g. `+44`.
    pub dial_code: String,
}

impl Country {
    pub fn new(name: impl Into<String>, dial_code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dial_code: dial_code.into(),
        }
    }
}

/// An issued phone-verification challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    /// Opaque, provider-issued.
    pub token: String,
    pub target_phone: String,
    pub created_at: DateTime<Utc>,
    /// Set once a code was confirmed. A consumed challenge cannot confirm again.
    pub consumed: bool,
}

impl Challenge {
    pub fn new(token: impl Into<String>, target_phone: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            target_phone: target_phone.into(),
            created_at: Utc::now(),
            consumed: false,
        }
    }
}

/// The identity a successful confirmation yields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedIdentity {
    pub id: IdentityId,
    pub phone: String,
}

/// Issues challenges and owns the provider-side session.
#[async_trait]
pub trait ChallengeProvider: Send + Sync {
    /// Sends a code to `full_phone`.
    ///
    /// Any anti-automation proof the provider needs is obtained here.
    async fn request_challenge(&self, full_phone: &str) -> AuthResult<Box<dyn ChallengeHandle>>;

    /// The identity of a session persisted by an earlier sign-in, if any.
    async fn restore_session(&self) -> AuthResult<Option<AuthenticatedIdentity>>;

    /// Forgets the provider session.
    async fn sign_out(&self) -> AuthResult<()>;
}

/// A pending challenge that can be confirmed with the code the user received.
#[async_trait]
pub trait ChallengeHandle: Send + Sync {
    fn challenge(&self) -> &Challenge;

    /// Resolves `code` to an identity. Rejection is `AuthError::InvalidCode`
    /// and leaves the handle usable; success consumes it.
    async fn confirm(&mut self, code: &str) -> AuthResult<AuthenticatedIdentity>;
}
