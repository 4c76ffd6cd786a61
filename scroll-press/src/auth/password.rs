// SPDX-License-Identifier: AGPL-3.0-or-later

//! Password hashing with Argon2id.
//!
//! The algorithm parameters are the crate defaults, no custom cryptography design happens here.
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Could not hash password: {0}")]
    Hash(String),
}

/// Hashes a plain password into its PHC string form for storage.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PasswordError::Hash(err.to_string()))
}

/// Verifies a plain password against a stored PHC hash string.
///
/// Unparseable stored hashes count as a failed verification instead of an error, a login
/// attempt must never turn into a 500 because of a corrupt row.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
