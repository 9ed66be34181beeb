use std::sync::Arc;
use tracing::info;

use super::credentials::SecretHasher;
use crate::db::{User, UserStore};
use crate::error::{AppError, DatabaseError};

pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Account registration. Email uniqueness is left to the store's atomic
/// insert, so two concurrent signups for one address yield one account.
pub struct SignupService {
    users: Arc<dyn UserStore>,
    hasher: SecretHasher,
}

impl SignupService {
    pub fn new(users: Arc<dyn UserStore>, hasher: SecretHasher) -> Self {
        Self { users, hasher }
    }

    pub async fn signup(&self, account: NewAccount) -> Result<User, AppError> {
        let password_hash = self.hasher.hash(&account.password)?;
        let user = User::new(account.name, account.email, password_hash);

        match self.users.insert(&user).await {
            Ok(()) => {
                info!("Registered account {}", user.email);
                Ok(user)
            }
            Err(DatabaseError::Duplicate) => Err(AppError::Conflict(format!(
                "User with the email address '{}' already exists.",
                user.email
            ))),
            Err(e) => Err(e.into()),
        }
    }
}
