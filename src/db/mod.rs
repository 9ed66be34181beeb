//! Persistence collaborators for accounts and the login attempt ledger.
//!
//! Both stores are traits so the service can run against Postgres in
//! production and against the in-memory implementation in tests.

pub mod memory;
pub mod models;
pub mod operations;

use async_trait::async_trait;

use crate::error::DatabaseError;

pub use memory::InMemoryStore;
pub use models::{LoginAttempt, User};
pub use operations::DbOperations;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a new account. Fails with `DatabaseError::Duplicate` when the
    /// email is already registered; the check and the insert are one atomic unit.
    async fn insert(&self, user: &User) -> Result<(), DatabaseError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn append(&self, attempt: &LoginAttempt) -> Result<(), DatabaseError>;

    /// Most recent first, at most `limit` entries.
    async fn find_recent(&self, email: &str, limit: u32) -> Result<Vec<LoginAttempt>, DatabaseError>;
}
