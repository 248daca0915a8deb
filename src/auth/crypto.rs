//! # Cryptographic Utilities
//!
//! Password hashing and reset-token generation. Passwords are only ever
//! stored as Argon2id hashes; reset tokens only as SHA-256 digests.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::errors::{AuthError, AuthResult};

/// Password requirements
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self { min_length: 8 }
    }
}

impl PasswordPolicy {
    /// Check a new password and its confirmation, returning the
    /// violated rules as validation messages
    pub fn violations(&self, password: &str, confirm: Option<&str>) -> Vec<String> {
        let mut messages = Vec::new();
        if password.is_empty() {
            messages.push("Please provide a password".to_string());
        } else if password.chars().count() < self.min_length {
            messages.push(format!(
                "A password must have at least {} characters",
                self.min_length
            ));
        }
        match confirm {
            None | Some("") => messages.push("Please confirm your password".to_string()),
            Some(confirm) if confirm != password => {
                messages.push("Passwords are not the same!".to_string())
            }
            Some(_) => {}
        }
        messages
    }
}

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::HashingFailed)
}

/// Verify a password against its hash
///
/// An unparseable stored hash never verifies.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Generate a cryptographically secure random token
///
/// Returns a 256-bit (32-byte) random value as base64.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

/// Hash a token for storage using SHA-256
///
/// Tokens are stored hashed; the raw token is only given to the user.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let result = hasher.finalize();
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, result)
}
