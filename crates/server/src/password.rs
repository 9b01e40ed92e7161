//! Password hashing.
//!
//! Passwords are stored only as argon2id PHC strings; the plaintext never
//! reaches the repository layer. Verification goes through
//! [`Argon2::verify_password`], which re-derives the hash and compares in
//! constant time.

use argon2::{
    Argon2, PasswordHasher, PasswordVerifier,
    password_hash::{self, PasswordHash, SaltString, rand_core::OsRng},
};

use crate::error::AuthError;

/// Hashes a plaintext password with a fresh random salt.
///
/// # Errors
///
/// Returns [`AuthError::PasswordHash`] if hashing fails (this does not
/// depend on user input).
pub fn hash(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            tracing::error!(error = %e, "password hashing failed");
            AuthError::PasswordHash
        })
}

/// Verifies a plaintext password against a stored PHC hash string.
///
/// Returns `Ok(false)` on mismatch — only a malformed stored hash is an
/// error.
pub fn verify(password: &str, stored_hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        tracing::error!(error = %e, "stored password hash is malformed");
        AuthError::PasswordHash
    })?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => {
            tracing::error!(error = %e, "password verification failed");
            Err(AuthError::PasswordHash)
        },
    }
}
