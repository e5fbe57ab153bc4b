//! Password/PIN hashing and session tokens

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use std::collections::HashMap;

use super::types::UserId;

#[derive(Debug, Clone)]
pub enum AuthError {
    HashingFailed,
    InvalidPassword,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::HashingFailed => write!(f, "password hashing failed"),
            AuthError::InvalidPassword => write!(f, "invalid password"),
        }
    }
}

/// Hash a password (or withdrawal PIN) using Argon2id
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AuthError::HashingFailed)?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against a stored PHC hash string
pub fn verify_password(password: &str, password_hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|_| AuthError::InvalidPassword)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidPassword)
}

/// In-memory session table mapping bearer tokens to user ids.
///
/// Tokens are opaque 32-byte random values; authorization decisions are
/// always made against the stored account the token resolves to, never
/// against anything the client sends.
#[derive(Default)]
pub struct SessionManager {
    sessions: HashMap<String, UserId>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for a user
    pub fn issue(&mut self, user_id: &str) -> String {
        let token = hex::encode(rand::random::<[u8; 32]>());
        self.sessions.insert(token.clone(), user_id.to_string());
        token
    }

    /// Resolve a token to the user id it was issued for
    pub fn resolve(&self, token: &str) -> Option<UserId> {
        self.sessions.get(token).cloned()
    }

    /// Revoke a token; returns whether it existed
    pub fn revoke(&mut self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }
}
