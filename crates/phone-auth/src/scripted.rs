//! Deterministic challenge provider for tests and demos.
//!
//! Every phone number gets a fixed code and a stable identity id. Failures
//! can be scripted and every call is counted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use identity_store::IdentityId;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::provider::{AuthenticatedIdentity, Challenge, ChallengeHandle, ChallengeProvider};

/// Code accepted for numbers that were not registered explicitly.
pub const DEFAULT_SCRIPTED_CODE: &str = "123456";

#[derive(Debug, Clone)]
struct Account {
    id: IdentityId,
    code: String,
}

#[derive(Debug, Default)]
struct ScriptState {
    accounts: HashMap<String, Account>,
    failing_requests: u32,
    persisted: Option<AuthenticatedIdentity>,
    requests: u32,
    confirms: u32,
    sign_outs: u32,
}

impl ScriptState {
    fn account_for(&mut self, phone: &str) -> Account {
        self.accounts
            .entry(phone.to_string())
            .or_insert_with(|| Account {
                id: IdentityId::from(format!(
                    "uid-{}",
                    phone.trim_start_matches('+')
                )),
                code: DEFAULT_SCRIPTED_CODE.to_string(),
            })
            .clone()
    }
}

/// In-process [`ChallengeProvider`]. Clones share state.
#[derive(Clone, Default)]
pub struct ScriptedChallengeProvider {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedChallengeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `phone` with a fixed identity id and code.
    pub fn with_account(self, phone: &str, id: &str, code: &str) -> Self {
        {
            let mut state = self.state.lock().expect("lock poisoned");
            state.accounts.insert(
                phone.to_string(),
                Account {
                    id: IdentityId::from(id),
                    code: code.to_string(),
                },
            );
        }
        self
    }

    /// Makes the next `count` challenge requests fail.
    pub fn fail_next_requests(&self, count: u32) {
        self.state.lock().expect("lock poisoned").failing_requests = count;
    }

    /// Pretends an earlier run left a signed-in session behind.
    pub fn set_persisted_session(&self, identity: Option<AuthenticatedIdentity>) {
        self.state.lock().expect("lock poisoned").persisted = identity;
    }

    /// The identity `phone` will confirm as.
    pub fn identity_for(&self, phone: &str) -> IdentityId {
        self.state.lock().expect("lock poisoned").account_for(phone).id
    }

    pub fn request_count(&self) -> u32 {
        self.state.lock().expect("lock poisoned").requests
    }

    pub fn confirm_count(&self) -> u32 {
        self.state.lock().expect("lock poisoned").confirms
    }

    pub fn sign_out_count(&self) -> u32 {
        self.state.lock().expect("lock poisoned").sign_outs
    }
}

#[async_trait]
impl ChallengeProvider for ScriptedChallengeProvider {
    async fn request_challenge(&self, full_phone: &str) -> AuthResult<Box<dyn ChallengeHandle>> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.requests += 1;

        if state.failing_requests > 0 {
            state.failing_requests -= 1;
            return Err(AuthError::AuthProvider(format!(
                "scripted failure sending code to {}",
                full_phone
            )));
        }

        let account = state.account_for(full_phone);
        Ok(Box::new(ScriptedHandle {
            challenge: Challenge::new(Uuid::new_v4().to_string(), full_phone),
            account,
            state: Arc::clone(&self.state),
        }))
    }

    async fn restore_session(&self) -> AuthResult<Option<AuthenticatedIdentity>> {
        Ok(self.state.lock().expect("lock poisoned").persisted.clone())
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.sign_outs += 1;
        state.persisted = None;
        Ok(())
    }
}

struct ScriptedHandle {
    challenge: Challenge,
    account: Account,
    state: Arc<Mutex<ScriptState>>,
}

#[async_trait]
impl ChallengeHandle for ScriptedHandle {
    fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    async fn confirm(&mut self, code: &str) -> AuthResult<AuthenticatedIdentity> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.confirms += 1;

        if self.challenge.consumed {
            return Err(AuthError::AuthProvider(
                "challenge was already used".to_string(),
            ));
        }
        if code != self.account.code {
            return Err(AuthError::InvalidCode(format!(
                "code does not match challenge for {}",
                self.challenge.target_phone
            )));
        }

        self.challenge.consumed = true;
        let identity = AuthenticatedIdentity {
            id: self.account.id.clone(),
            phone: self.challenge.target_phone.clone(),
        };
        state.persisted = Some(identity.clone());
        Ok(identity)
    }
}
