use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Salted one-way hash in PHC string form.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

/// Audit record of a single login call. Never updated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LoginAttempt {
    pub email: String,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

impl LoginAttempt {
    pub fn new(email: &str, success: bool, created_at: DateTime<Utc>) -> Self {
        Self {
            email: email.to_string(),
            success,
            created_at,
        }
    }
}
