//! Local input checks. These run before any provider call.

use crate::error::{AuthError, AuthResult};
use crate::provider::Country;

/// Minimum digits in the local part of a phone number.
pub const MIN_LOCAL_DIGITS: usize = 7;

const CODE_LENGTH: usize = 6;

/// Strips spaces and dashes from a local number and checks what remains.
pub fn normalize_local_number(local_number: &str) -> AuthResult<String> {
    let digits: String = local_number
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect();

    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_digit()) {
        return Err(AuthError::Validation(format!(
            "phone number may only contain digits, found {:?}",
            bad
        )));
    }
    if digits.len() < MIN_LOCAL_DIGITS {
        return Err(AuthError::Validation(format!(
            "phone number needs at least {} digits, got {}",
            MIN_LOCAL_DIGITS,
            digits.len()
        )));
    }
    Ok(digits)
}

/// `country.dial_code` followed by the normalized local number.
pub fn full_phone_number(country: &Country, local_number: &str) -> AuthResult<String> {
    let dial = country.dial_code.trim();
    let valid_dial = dial
        .strip_prefix('+')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()));
    if !valid_dial {
        return Err(AuthError::Validation(format!(
            "dial code must look like +<digits>, got {:?}",
            country.dial_code
        )));
    }

    let local = normalize_local_number(local_number)?;
    Ok(format!("{}{}", dial, local))
}

/// A confirmation code is exactly six ASCII digits.
pub fn validate_code(code: &str) -> AuthResult<()> {
    if code.len() != CODE_LENGTH || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AuthError::Validation(format!(
            "verification code must be {} digits",
            CODE_LENGTH
        )));
    }
    Ok(())
}
