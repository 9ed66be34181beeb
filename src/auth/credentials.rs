use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::sync::Arc;
use thiserror::Error;

use crate::db::UserStore;
use crate::error::{AppError, AuthError, DatabaseError};

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("no account for subject")]
    NotFound,

    #[error("secret does not match")]
    Mismatch,

    #[error("user lookup failed: {0}")]
    Store(#[from] DatabaseError),
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NotFound | CredentialError::Mismatch => {
                AppError::AuthError(AuthError::InvalidCredentials)
            }
            CredentialError::Store(e) => AppError::DatabaseError(e),
        }
    }
}

/// Argon2id hashing of account secrets.
#[derive(Clone, Default)]
pub struct SecretHasher {
    argon2: Argon2<'static>,
}

impl SecretHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash(&self, secret: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::InternalError(format!("Password hashing failed: {}", e)))
    }

    /// Constant-time comparison of `secret` against a stored PHC hash.
    /// An unparseable stored hash never matches.
    pub fn matches(&self, secret: &str, stored_hash: &str) -> bool {
        match PasswordHash::new(stored_hash) {
            Ok(parsed) => self.argon2.verify_password(secret.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}

pub struct CredentialVerifier {
    users: Arc<dyn UserStore>,
    hasher: SecretHasher,
    // Verified against on unknown subjects so both failure paths cost one hash.
    decoy_hash: String,
}

impl CredentialVerifier {
    pub fn new(users: Arc<dyn UserStore>, hasher: SecretHasher) -> Result<Self, AppError> {
        let decoy_hash = hasher.hash("decoy-secret-for-unknown-accounts")?;
        Ok(Self {
            users,
            hasher,
            decoy_hash,
        })
    }

    pub async fn verify(&self, subject: &str, secret: &str) -> Result<(), CredentialError> {
        let Some(user) = self.users.find_by_email(subject).await? else {
            let _ = self.hasher.matches(secret, &self.decoy_hash);
            return Err(CredentialError::NotFound);
        };

        if self.hasher.matches(secret, &user.password_hash) {
            Ok(())
        } else {
            Err(CredentialError::Mismatch)
        }
    }
}
