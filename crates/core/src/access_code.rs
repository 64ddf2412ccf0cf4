//! Guest access code generation and normalization.

use rand::Rng;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Upper-case letters and digits without `0 O 1 I`, which guests misread.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const DEFAULT_CODE_LENGTH: usize = 6;

pub const MIN_CODE_LENGTH: usize = 4;

pub const MAX_CODE_LENGTH: usize = 12;

/// Fresh codes tried when the store reports a collision.
pub const MAX_COLLISION_RETRIES: usize = 5;

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

pub fn validate_code_length(length: usize) -> Result<(), CoreError> {
    if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&length) {
        return Err(CoreError::Validation(format!(
            "Access code length {length} is out of range ({MIN_CODE_LENGTH}..{MAX_CODE_LENGTH})"
        )));
    }
    Ok(())
}

/// Generate a random code of `length` characters from [`CODE_ALPHABET`].
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect()
}

/// Canonical lookup form of a code typed by a guest.
pub fn normalize_code(input: &str) -> String {
    input.trim().to_uppercase()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
