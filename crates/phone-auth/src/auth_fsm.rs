//! Sign-in state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! ┌───────────────────┐  RestoredWithProfile
//! │  Unauthenticated  │ ─────────────────────────────────────────┐
//! └─────────┬─────────┘  RestoredWithoutProfile ──┐              │
//!           │ ChallengeIssued        ▲            │              │
//!           ▼                        │            │              │
//! ┌───────────────────┐ ChallengeAbandoned        │              │
//! │ ChallengePending  │ ──────────────┘           │              │
//! └─────────┬─────────┘ (ChallengeIssued / CodeRejected loop)    │
//!           │ ConfirmedWithoutProfile             │              │
//!           ▼                                     ▼              │
//! ┌────────────────────────┐                                     │
//! │ VerifiedProfileMissing │ ◄───────────────────────────────────┤
//! └─────────┬──────────────┘                                     │
//!           │ ProfileCompleted     ConfirmedWithProfile          │
//!           ▼                                                    │
//! ┌───────────────────┐ ◄────────────────────────────────────────┘
//! │       Ready       │
//! └───────────────────┘
//!
//! SignedOut returns every state to Unauthenticated.
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub phone_auth_machine(Unauthenticated)

    Unauthenticated => {
        ChallengeIssued => ChallengePending,
        RestoredWithoutProfile => VerifiedProfileMissing,
        RestoredWithProfile => Ready,
        SignedOut => Unauthenticated
    },
    ChallengePending => {
        // Resend replaces the handle
        ChallengeIssued => ChallengePending,
        CodeRejected => ChallengePending,
        ConfirmedWithoutProfile => VerifiedProfileMissing,
        ConfirmedWithProfile => Ready,
        ChallengeAbandoned => Unauthenticated,
        SignedOut => Unauthenticated
    },
    VerifiedProfileMissing => {
        ProfileCompleted => Ready,
        SignedOut => Unauthenticated
    },
    Ready => {
        SignedOut => Unauthenticated
    }
}

pub use phone_auth_machine::Input as PhoneAuthMachineInput;
pub use phone_auth_machine::State as PhoneAuthMachineState;
pub use phone_auth_machine::StateMachine as PhoneAuthMachine;

/// Sign-in state for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    /// A code was sent and can be confirmed.
    ChallengePending,
    /// The phone is verified but no profile exists yet.
    VerifiedProfileMissing,
    /// Signed in with a profile; chat operations are allowed.
    Ready,
}

impl AuthState {
    pub fn is_ready(&self) -> bool {
        matches!(self, AuthState::Ready)
    }

    /// True once the provider has confirmed the phone number.
    pub fn is_verified(&self) -> bool {
        matches!(self, AuthState::VerifiedProfileMissing | AuthState::Ready)
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuthState::Unauthenticated => "unauthenticated",
            AuthState::ChallengePending => "challenge_pending",
            AuthState::VerifiedProfileMissing => "verified_profile_missing",
            AuthState::Ready => "ready",
        };
        f.write_str(name)
    }
}

impl From<&PhoneAuthMachineState> for AuthState {
    fn from(state: &PhoneAuthMachineState) -> Self {
        match state {
            PhoneAuthMachineState::Unauthenticated => AuthState::Unauthenticated,
            PhoneAuthMachineState::ChallengePending => AuthState::ChallengePending,
            PhoneAuthMachineState::VerifiedProfileMissing => AuthState::VerifiedProfileMissing,
            PhoneAuthMachineState::Ready => AuthState::Ready,
        }
    }
}

/// Payload for auth state change events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStateChangedPayload {
    /// Current auth state.
    pub state: AuthState,
    /// Verified user ID, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}
