use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use super::models::{LoginAttempt, User};
use super::{AttemptStore, UserStore};
use crate::error::DatabaseError;

/// Postgres-backed implementation of the persistence collaborators.
#[derive(Clone)]
pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(self.pool.as_ref())
            .await
            .map_err(|e| DatabaseError::QueryError(e.to_string()))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl UserStore for DbOperations {
    async fn insert(&self, user: &User) -> Result<(), DatabaseError> {
        // The UNIQUE constraint on email settles concurrent signups.
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl AttemptStore for DbOperations {
    async fn append(&self, attempt: &LoginAttempt) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO login_attempts (email, success, created_at) VALUES ($1, $2, $3)",
        )
        .bind(&attempt.email)
        .bind(attempt.success)
        .bind(attempt.created_at)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() != 1 {
            return Err(DatabaseError::QueryError(
                "Could not add login attempt".to_string(),
            ));
        }

        Ok(())
    }

    async fn find_recent(&self, email: &str, limit: u32) -> Result<Vec<LoginAttempt>, DatabaseError> {
        let attempts = sqlx::query_as::<_, LoginAttempt>(
            r#"
            SELECT email, success, created_at
            FROM login_attempts
            WHERE email = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(email)
        .bind(i64::from(limit))
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(attempts)
    }
}
