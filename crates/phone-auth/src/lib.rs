//! Phone-number sign-in for the chat core.
//!
//! [`AuthController`] walks a user from phone entry through code
//! confirmation and profile completion to `Ready`, at which point it hands
//! out a [`SessionContext`]. Everything that reads or writes chat data takes
//! that context, and signing out revokes it.

mod auth_fsm;
mod context;
mod controller;
mod error;
mod provider;
mod scripted;
mod supabase_phone;
mod validate;

pub use auth_fsm::{
    AuthState, AuthStateChangedPayload, PhoneAuthMachine, PhoneAuthMachineInput,
    PhoneAuthMachineState,
};
pub use context::SessionContext;
pub use controller::{AuthController, AuthStateCallback};
pub use error::{AuthError, AuthResult};
pub use provider::{AuthenticatedIdentity, Challenge, ChallengeHandle, ChallengeProvider, Country};
pub use scripted::{ScriptedChallengeProvider, DEFAULT_SCRIPTED_CODE};
pub use supabase_phone::{
    supabase_auth_controller, AntiAutomationProof, NoProof, RefreshConfig, StaticProof,
    SupabasePhoneProvider,
};
pub use validate::{full_phone_number, normalize_local_number, validate_code, MIN_LOCAL_DIGITS};
