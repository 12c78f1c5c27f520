//! Sign-in controller built on the phone-auth state machine.
//!
//! The FSM decides which operations are legal; the controller keeps the data
//! each state owns (the pending challenge, the verified identity, the session
//! context) and performs the provider and store calls around each transition.

use std::sync::Arc;

use identity_store::{AppId, Identity, IdentityStore, ProfileDraft};
use tracing::{debug, info, warn};

use crate::auth_fsm::{
    AuthState, AuthStateChangedPayload, PhoneAuthMachine, PhoneAuthMachineInput,
};
use crate::context::SessionContext;
use crate::error::{AuthError, AuthResult};
use crate::provider::{AuthenticatedIdentity, Challenge, ChallengeHandle, ChallengeProvider, Country};
use crate::validate::{full_phone_number, validate_code};

/// Callback type for auth state change notifications.
pub type AuthStateCallback = Box<dyn Fn(AuthStateChangedPayload) + Send + Sync>;

struct PendingChallenge {
    handle: Box<dyn ChallengeHandle>,
    /// Set when `confirm` succeeded but the profile lookup did not.
    confirmed: Option<AuthenticatedIdentity>,
}

enum Phase {
    Idle,
    Pending(PendingChallenge),
    ProfileMissing(AuthenticatedIdentity),
    Ready(SessionContext),
}

/// Drives a user from phone entry to a `Ready` session.
pub struct AuthController {
    app_id: AppId,
    provider: Arc<dyn ChallengeProvider>,
    store: Arc<dyn IdentityStore>,
    fsm: PhoneAuthMachine,
    phase: Phase,
    state_callback: Option<AuthStateCallback>,
}

impl AuthController {
    pub fn new(
        app_id: AppId,
        provider: Arc<dyn ChallengeProvider>,
        store: Arc<dyn IdentityStore>,
    ) -> Self {
        Self {
            app_id,
            provider,
            store,
            fsm: PhoneAuthMachine::new(),
            phase: Phase::Idle,
            state_callback: None,
        }
    }

    /// Set a callback to be notified of auth state changes.
    pub fn set_state_callback(&mut self, callback: AuthStateCallback) {
        self.state_callback = Some(callback);
    }

    pub fn state(&self) -> AuthState {
        AuthState::from(self.fsm.state())
    }

    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    /// The challenge awaiting a code, if any.
    pub fn pending_challenge(&self) -> Option<&Challenge> {
        match &self.phase {
            Phase::Pending(pending) => Some(pending.handle.challenge()),
            _ => None,
        }
    }

    /// The signed-in profile once `Ready`.
    pub fn identity(&self) -> Option<&Identity> {
        match &self.phase {
            Phase::Ready(ctx) => Some(ctx.identity()),
            _ => None,
        }
    }

    /// The session context for chat operations. Only available in `Ready`.
    pub fn session(&self) -> AuthResult<SessionContext> {
        match &self.phase {
            Phase::Ready(ctx) => Ok(ctx.clone()),
            _ => Err(AuthError::NotReady(format!(
                "session requested in state {}",
                self.state()
            ))),
        }
    }

    fn user_id(&self) -> Option<String> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Pending(pending) => pending
                .confirmed
                .as_ref()
                .map(|identity| identity.id.to_string()),
            Phase::ProfileMissing(identity) => Some(identity.id.to_string()),
            Phase::Ready(ctx) => Some(ctx.user_id().to_string()),
        }
    }

    fn require(&self, allowed: &[AuthState], operation: &str) -> AuthResult<()> {
        let state = self.state();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(AuthError::InvalidStateTransition(format!(
                "Cannot {} in state {}",
                operation, state
            )))
        }
    }

    /// Transition the FSM, install the new phase, and notify if the state changed.
    fn enter(&mut self, input: PhoneAuthMachineInput, phase: Phase) -> AuthResult<AuthState> {
        let old_state = self.state();

        self.fsm.consume(&input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {}",
                input, old_state
            ))
        })?;
        self.phase = phase;

        let new_state = self.state();
        if old_state != new_state {
            debug!(
                old_state = %old_state,
                new_state = %new_state,
                "Auth state transition"
            );
            self.notify_state_change(new_state);
        }

        Ok(new_state)
    }

    fn notify_state_change(&self, state: AuthState) {
        if let Some(callback) = self.state_callback.as_ref() {
            callback(AuthStateChangedPayload {
                state,
                user_id: self.user_id(),
            });
        }
    }

    fn ready(&self, profile: Identity) -> Phase {
        Phase::Ready(SessionContext::new(
            self.app_id.clone(),
            profile,
            Arc::clone(&self.store),
        ))
    }

    /// Requests a code for `country.dial_code + local_number`.
    ///
    /// Also used to resend while a challenge is pending; the old handle is
    /// only replaced once the provider issued the new one.
    pub async fn submit_phone(
        &mut self,
        country: &Country,
        local_number: &str,
    ) -> AuthResult<Challenge> {
        self.require(
            &[AuthState::Unauthenticated, AuthState::ChallengePending],
            "submit a phone number",
        )?;
        let full_phone = full_phone_number(country, local_number)?;

        debug!(country = %country.name, "Requesting phone challenge");

        let handle = self
            .provider
            .request_challenge(&full_phone)
            .await
            .map_err(|e| {
                warn!(error = %e, "Challenge request failed");
                match e {
                    AuthError::AuthProvider(_) => e,
                    other => AuthError::AuthProvider(other.to_string()),
                }
            })?;

        let challenge = handle.challenge().clone();
        self.enter(
            PhoneAuthMachineInput::ChallengeIssued,
            Phase::Pending(PendingChallenge {
                handle,
                confirmed: None,
            }),
        )?;

        info!("Phone challenge issued");
        Ok(challenge)
    }

    /// Confirms the pending challenge and loads the profile.
    pub async fn submit_code(&mut self, code: &str) -> AuthResult<AuthState> {
        self.require(&[AuthState::ChallengePending], "submit a code")?;
        validate_code(code)?;

        let outcome = match &mut self.phase {
            Phase::Pending(pending) => {
                if let Some(identity) = pending.confirmed.clone() {
                    Ok(identity)
                } else {
                    let confirmed = pending.handle.confirm(code).await;
                    if let Ok(identity) = &confirmed {
                        pending.confirmed = Some(identity.clone());
                    }
                    confirmed
                }
            }
            _ => Err(AuthError::InvalidStateTransition(
                "no challenge is pending".to_string(),
            )),
        };

        let identity = match outcome {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Code confirmation failed");
                let phase = std::mem::replace(&mut self.phase, Phase::Idle);
                self.enter(PhoneAuthMachineInput::CodeRejected, phase)?;
                return Err(e);
            }
        };

        let profile = match self.store.get_profile(&self.app_id, &identity.id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user_id = %identity.id, error = %e, "Profile lookup failed after confirmation");
                return Err(e.into());
            }
        };

        let state = match profile {
            Some(profile) => {
                let phase = self.ready(profile);
                self.enter(PhoneAuthMachineInput::ConfirmedWithProfile, phase)?
            }
            None => self.enter(
                PhoneAuthMachineInput::ConfirmedWithoutProfile,
                Phase::ProfileMissing(identity.clone()),
            )?,
        };

        info!(user_id = %identity.id, state = %state, "Phone verified");
        Ok(state)
    }

    /// Writes the private profile, then the public directory entry.
    pub async fn complete_profile(&mut self, display_name: &str) -> AuthResult<Identity> {
        self.require(&[AuthState::VerifiedProfileMissing], "complete a profile")?;

        let name = display_name.trim();
        if name.is_empty() {
            return Err(AuthError::Validation(
                "display name must not be empty".to_string(),
            ));
        }

        let verified = match &self.phase {
            Phase::ProfileMissing(identity) => identity.clone(),
            _ => {
                return Err(AuthError::InvalidStateTransition(
                    "no verified identity".to_string(),
                ))
            }
        };

        let draft = ProfileDraft::new(verified.id.clone(), name, verified.phone.clone());
        let profile = self.store.upsert_profile(&self.app_id, &draft).await?;
        self.store
            .upsert_directory_entry(&self.app_id, &profile)
            .await?;

        let phase = self.ready(profile.clone());
        self.enter(PhoneAuthMachineInput::ProfileCompleted, phase)?;

        info!(user_id = %profile.id, "Profile completed");
        Ok(profile)
    }

    /// Abandons the pending challenge and returns to phone entry.
    pub fn change_number(&mut self) -> AuthResult<()> {
        self.require(&[AuthState::ChallengePending], "change the number")?;
        self.enter(PhoneAuthMachineInput::ChallengeAbandoned, Phase::Idle)?;
        Ok(())
    }

    /// Resumes a session the provider persisted earlier.
    ///
    /// Without one the controller stays `Unauthenticated`.
    pub async fn restore(&mut self) -> AuthResult<AuthState> {
        self.require(&[AuthState::Unauthenticated], "restore a session")?;

        let Some(identity) = self.provider.restore_session().await? else {
            debug!("No persisted session to restore");
            return Ok(self.state());
        };

        let state = match self.store.get_profile(&self.app_id, &identity.id).await? {
            Some(mut profile) => {
                match self.store.touch_last_seen(&self.app_id, &profile.id).await {
                    Ok(at) => profile.last_seen_at = at,
                    Err(e) => {
                        warn!(user_id = %profile.id, error = %e, "Failed to refresh last seen")
                    }
                }
                let phase = self.ready(profile);
                self.enter(PhoneAuthMachineInput::RestoredWithProfile, phase)?
            }
            None => self.enter(
                PhoneAuthMachineInput::RestoredWithoutProfile,
                Phase::ProfileMissing(identity.clone()),
            )?,
        };

        info!(user_id = %identity.id, state = %state, "Session restored");
        Ok(state)
    }

    /// Ends the local session from any state.
    ///
    /// Stored profiles and messages are left untouched.
    pub async fn sign_out(&mut self) -> AuthResult<()> {
        if let Phase::Ready(ctx) = &self.phase {
            ctx.revoke();
        }

        if let Err(e) = self.provider.sign_out().await {
            warn!(error = %e, "Provider sign-out failed, clearing local session anyway");
        }

        self.enter(PhoneAuthMachineInput::SignedOut, Phase::Idle)?;
        info!("Signed out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptedChallengeProvider, DEFAULT_SCRIPTED_CODE};
    use identity_store::{IdentityId, MemoryIdentityStore, StoreError};
    use std::sync::Mutex;

    struct Harness {
        controller: AuthController,
        provider: ScriptedChallengeProvider,
        store: Arc<MemoryIdentityStore>,
    }

    fn harness() -> Harness {
        let provider = ScriptedChallengeProvider::new().with_account("+15550001111", "alice", "111111");
        let store = Arc::new(MemoryIdentityStore::new());
        let controller = AuthController::new(
            AppId::from("test-app"),
            Arc::new(provider.clone()),
            store.clone(),
        );
        Harness {
            controller,
            provider,
            store,
        }
    }

    fn us() -> Country {
        Country::new("United States", "+1")
    }

    #[tokio::test]
    async fn test_new_user_signup_flow() {
        let mut h = harness();

        let challenge = h.controller.submit_phone(&us(), "555 000-1111").await.unwrap();
        assert_eq!(challenge.target_phone, "+15550001111");
        assert_eq!(h.controller.state(), AuthState::ChallengePending);

        let state = h.controller.submit_code("111111").await.unwrap();
        assert_eq!(state, AuthState::VerifiedProfileMissing);
        assert!(h.controller.session().is_err());

        let profile = h.controller.complete_profile("  Sam ").await.unwrap();
        assert_eq!(profile.display_name, "Sam");
        assert_eq!(profile.avatar_tag, identity_store::DEFAULT_AVATAR_TAG);
        assert_eq!(h.controller.state(), AuthState::Ready);

        let ctx = h.controller.session().unwrap();
        assert_eq!(ctx.user_id().as_str(), "alice");
        assert!(h
            .store
            .directory_entry(&AppId::from("test-app"), &IdentityId::from("alice"))
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_returning_user_goes_straight_to_ready() {
        let mut h = harness();
        h.store
            .upsert_profile(
                &AppId::from("test-app"),
                &ProfileDraft::new(IdentityId::from("alice"), "Alice", "+15550001111"),
            )
            .await
            .unwrap();

        h.controller.submit_phone(&us(), "5550001111").await.unwrap();
        let state = h.controller.submit_code("111111").await.unwrap();
        assert_eq!(state, AuthState::Ready);
        assert_eq!(h.controller.identity().unwrap().display_name, "Alice");
    }

    #[tokio::test]
    async fn test_short_phone_is_rejected_without_provider_call() {
        let mut h = harness();
        let err = h.controller.submit_phone(&us(), "555 12").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        assert_eq!(h.provider.request_count(), 0);
        assert_eq!(h.controller.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_state() {
        let mut h = harness();
        h.provider.fail_next_requests(1);

        let err = h.controller.submit_phone(&us(), "5550001111").await.unwrap_err();
        assert!(matches!(err, AuthError::AuthProvider(_)));
        assert_eq!(h.controller.state(), AuthState::Unauthenticated);
        assert!(h.controller.pending_challenge().is_none());
    }

    #[tokio::test]
    async fn test_wrong_length_code_never_reaches_provider() {
        let mut h = harness();
        h.controller.submit_phone(&us(), "5550001111").await.unwrap();

        for code in ["12345", "1234567", "abcdef", ""] {
            let err = h.controller.submit_code(code).await.unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)));
        }
        assert_eq!(h.provider.confirm_count(), 0);
        assert_eq!(h.controller.state(), AuthState::ChallengePending);
    }

    #[tokio::test]
    async fn test_rejected_code_keeps_challenge_for_retry() {
        let mut h = harness();
        let issued = h.controller.submit_phone(&us(), "5550001111").await.unwrap();

        let err = h.controller.submit_code("999999").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCode(_)));
        assert_eq!(h.controller.state(), AuthState::ChallengePending);
        assert_eq!(h.controller.pending_challenge().unwrap().token, issued.token);

        assert_eq!(
            h.controller.submit_code("111111").await.unwrap(),
            AuthState::VerifiedProfileMissing
        );
    }

    #[tokio::test]
    async fn test_lookup_failure_after_confirm_retries_lookup_only() {
        let mut h = harness();
        h.controller.submit_phone(&us(), "5550001111").await.unwrap();
        h.store.fail_next_reads(1);

        let err = h.controller.submit_code("111111").await.unwrap_err();
        assert!(matches!(err, AuthError::Store(StoreError::Unavailable(_))));
        assert_eq!(h.controller.state(), AuthState::ChallengePending);
        assert!(h.controller.pending_challenge().unwrap().consumed);

        let state = h.controller.submit_code("111111").await.unwrap();
        assert_eq!(state, AuthState::VerifiedProfileMissing);
        assert_eq!(h.provider.confirm_count(), 1);
    }

    #[tokio::test]
    async fn test_code_outside_challenge_is_invalid_transition() {
        let mut h = harness();
        let err = h.controller.submit_code("111111").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidStateTransition(_)));
    }

    #[tokio::test]
    async fn test_resend_replaces_challenge() {
        let mut h = harness();
        let first = h.controller.submit_phone(&us(), "5550001111").await.unwrap();
        let second = h.controller.submit_phone(&us(), "5550001111").await.unwrap();

        assert_ne!(first.token, second.token);
        assert_eq!(h.controller.pending_challenge().unwrap().token, second.token);
        assert_eq!(h.provider.request_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_resend_keeps_old_challenge() {
        let mut h = harness();
        let first = h.controller.submit_phone(&us(), "5550001111").await.unwrap();
        h.provider.fail_next_requests(1);

        assert!(h.controller.submit_phone(&us(), "5550001111").await.is_err());
        assert_eq!(h.controller.state(), AuthState::ChallengePending);
        assert_eq!(h.controller.pending_challenge().unwrap().token, first.token);
    }

    #[tokio::test]
    async fn test_change_number_returns_to_phone_entry() {
        let mut h = harness();
        h.controller.submit_phone(&us(), "5550001111").await.unwrap();

        h.controller.change_number().unwrap();
        assert_eq!(h.controller.state(), AuthState::Unauthenticated);
        assert!(h.controller.pending_challenge().is_none());
        assert!(h.controller.change_number().is_err());
    }

    #[tokio::test]
    async fn test_blank_names_are_rejected() {
        let mut h = harness();
        h.controller.submit_phone(&us(), "5550001111").await.unwrap();
        h.controller.submit_code("111111").await.unwrap();

        for name in ["", "   "] {
            let err = h.controller.complete_profile(name).await.unwrap_err();
            assert!(matches!(err, AuthError::Validation(_)));
        }
        assert_eq!(h.store.write_count(), 0);
        assert_eq!(h.controller.state(), AuthState::VerifiedProfileMissing);
    }

    #[tokio::test]
    async fn test_profile_write_failure_allows_retry() {
        let mut h = harness();
        h.controller.submit_phone(&us(), "5550001111").await.unwrap();
        h.controller.submit_code("111111").await.unwrap();
        h.store.fail_next_writes(1);

        let err = h.controller.complete_profile("Sam").await.unwrap_err();
        assert!(matches!(err, AuthError::Store(StoreError::WriteRejected(_))));
        assert_eq!(h.controller.state(), AuthState::VerifiedProfileMissing);

        h.controller.complete_profile("Sam").await.unwrap();
        assert_eq!(h.controller.state(), AuthState::Ready);
    }

    #[tokio::test]
    async fn test_sign_out_revokes_session() {
        let mut h = harness();
        h.controller.submit_phone(&us(), "5550001111").await.unwrap();
        h.controller.submit_code("111111").await.unwrap();
        h.controller.complete_profile("Sam").await.unwrap();
        let ctx = h.controller.session().unwrap();

        h.controller.sign_out().await.unwrap();

        assert!(!ctx.is_active());
        assert_eq!(h.controller.state(), AuthState::Unauthenticated);
        assert!(matches!(h.controller.session(), Err(AuthError::NotReady(_))));
        assert_eq!(h.provider.sign_out_count(), 1);
        assert!(h
            .store
            .get_profile(&AppId::from("test-app"), &IdentityId::from("alice"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_sign_out_from_unauthenticated_is_fine() {
        let mut h = harness();
        h.controller.sign_out().await.unwrap();
        assert_eq!(h.controller.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_restore_without_session_stays_unauthenticated() {
        let mut h = harness();
        assert_eq!(h.controller.restore().await.unwrap(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_restore_with_profile_refreshes_last_seen() {
        let mut h = harness();
        let app = AppId::from("test-app");
        let stored = h
            .store
            .upsert_profile(
                &app,
                &ProfileDraft::new(IdentityId::from("alice"), "Alice", "+15550001111"),
            )
            .await
            .unwrap();
        h.provider.set_persisted_session(Some(AuthenticatedIdentity {
            id: IdentityId::from("alice"),
            phone: "+15550001111".to_string(),
        }));

        assert_eq!(h.controller.restore().await.unwrap(), AuthState::Ready);
        let identity = h.controller.identity().unwrap();
        assert!(identity.last_seen_at > stored.last_seen_at);
    }

    #[tokio::test]
    async fn test_restore_without_profile_needs_completion() {
        let mut h = harness();
        h.provider.set_persisted_session(Some(AuthenticatedIdentity {
            id: IdentityId::from("bob"),
            phone: "+15550002222".to_string(),
        }));

        assert_eq!(
            h.controller.restore().await.unwrap(),
            AuthState::VerifiedProfileMissing
        );
        h.controller.complete_profile("Bob").await.unwrap();
        assert_eq!(h.controller.session().unwrap().user_id().as_str(), "bob");
    }

    #[tokio::test]
    async fn test_state_callback_reports_changes() {
        let mut h = harness();
        let seen: Arc<Mutex<Vec<AuthStateChangedPayload>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        h.controller.set_state_callback(Box::new(move |payload| {
            sink.lock().unwrap().push(payload);
        }));

        h.controller.submit_phone(&us(), "5550001111").await.unwrap();
        let _ = h.controller.submit_code("000000").await;
        h.controller.submit_code("111111").await.unwrap();
        h.controller.complete_profile("Sam").await.unwrap();

        let seen = seen.lock().unwrap();
        let states: Vec<AuthState> = seen.iter().map(|p| p.state).collect();
        assert_eq!(
            states,
            vec![
                AuthState::ChallengePending,
                AuthState::VerifiedProfileMissing,
                AuthState::Ready
            ]
        );
        assert_eq!(seen[0].user_id, None);
        assert_eq!(seen[2].user_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_default_code_for_unregistered_number() {
        let mut h = harness();
        h.controller.submit_phone(&us(), "5550009999").await.unwrap();
        h.controller.submit_code(DEFAULT_SCRIPTED_CODE).await.unwrap();
        assert_eq!(h.controller.state(), AuthState::VerifiedProfileMissing);
    }
}
