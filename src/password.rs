//! Password hashing for the login flow.
//!
//! Hashes are argon2id PHC strings with a random 16-byte salt. Only hashes
//! are ever stored; [`check_password`] goes through the library's
//! constant-time verification.

use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use crate::crypto;
use crate::error::LoginError;

const SALT_LEN: usize = 16;

/// Hashes `password` into a PHC string.
///
/// # Errors
///
/// Returns [`LoginError::Hash`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String, LoginError> {
    let salt = SaltString::encode_b64(&crypto::random_bytes(SALT_LEN)).map_err(|_| LoginError::Hash)?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| LoginError::Hash)?;
    Ok(hash.to_string())
}

/// Checks `password` against a stored PHC `hash`.
///
/// # Errors
///
/// [`LoginError::WrongPassword`] on mismatch, [`LoginError::Hash`] if the
/// stored hash cannot be parsed.
pub fn check_password(password: &str, hash: &str) -> Result<(), LoginError> {
    let parsed = PasswordHash::new(hash).map_err(|_| LoginError::Hash)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| LoginError::WrongPassword)
}
