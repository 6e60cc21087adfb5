use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(String),

    /// The stored digest is not a parseable PHC string.
    #[error("invalid password hash: {0}")]
    MalformedHash(String),
}

/// Hash a password using argon2id with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
///
/// A wrong password is `Ok(false)`, not an error. The comparison inside argon2 is
/// constant-time.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

// Stand-in digest checked when a login names an unknown user.
static DUMMY_HASH: LazyLock<Result<String, PasswordError>> =
    LazyLock::new(|| hash_password("unknown-user-placeholder"));

/// Run a full verification against a fixed digest and discard the outcome, so a
/// username miss costs the same argon2 work as a wrong password.
pub fn verify_dummy(password: &str) -> Result<(), PasswordError> {
    let hash = DUMMY_HASH.as_ref().map_err(Clone::clone)?;
    verify_password(password, hash).map(|_| ())
}
