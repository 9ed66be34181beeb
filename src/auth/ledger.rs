use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::{AttemptStore, LoginAttempt};
use crate::error::DatabaseError;

pub const DEFAULT_RECENT_LIMIT: u32 = 10;

/// Append-only audit trail of login outcomes.
pub struct AttemptLedger {
    store: Arc<dyn AttemptStore>,
    recent_limit: u32,
}

impl AttemptLedger {
    pub fn new(store: Arc<dyn AttemptStore>, recent_limit: u32) -> Self {
        Self { store, recent_limit }
    }

    pub async fn record(
        &self,
        subject: &str,
        succeeded: bool,
        occurred_at: DateTime<Utc>,
    ) -> Result<LoginAttempt, DatabaseError> {
        let attempt = LoginAttempt::new(subject, succeeded, occurred_at);
        self.store.append(&attempt).await?;
        Ok(attempt)
    }

    pub async fn recent(&self, subject: &str) -> Result<Vec<LoginAttempt>, DatabaseError> {
        let mut attempts = self.store.find_recent(subject, self.recent_limit).await?;
        // Ordering and bound hold whatever the store returns.
        attempts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        attempts.truncate(self.recent_limit as usize);
        Ok(attempts)
    }
}
