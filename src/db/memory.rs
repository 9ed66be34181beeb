use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::models::{LoginAttempt, User};
use super::{AttemptStore, UserStore};
use crate::error::DatabaseError;

/// Process-local store backing both collaborators.
///
/// Each write takes the map's write lock for its whole check-and-insert, which
/// gives the same uniqueness guarantee a `UNIQUE` constraint gives in Postgres.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    users: Arc<RwLock<HashMap<String, User>>>,
    attempts: Arc<RwLock<HashMap<String, Vec<LoginAttempt>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn insert(&self, user: &User) -> Result<(), DatabaseError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(DatabaseError::Duplicate);
        }
        users.insert(user.email.clone(), user.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        Ok(self.users.read().await.get(email).cloned())
    }
}

#[async_trait]
impl AttemptStore for InMemoryStore {
    async fn append(&self, attempt: &LoginAttempt) -> Result<(), DatabaseError> {
        self.attempts
            .write()
            .await
            .entry(attempt.email.clone())
            .or_default()
            .push(attempt.clone());
        Ok(())
    }

    async fn find_recent(&self, email: &str, limit: u32) -> Result<Vec<LoginAttempt>, DatabaseError> {
        let attempts = self.attempts.read().await;
        let Some(history) = attempts.get(email) else {
            return Ok(Vec::new());
        };

        // Reverse first so equal timestamps keep latest-appended first after the stable sort.
        let mut recent: Vec<LoginAttempt> = history.iter().rev().cloned().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(limit as usize);
        Ok(recent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = InMemoryStore::new();
        let first = User::new("mina".into(), "mina@x.com".into(), "hash".into());
        let second = User::new("other".into(), "mina@x.com".into(), "hash2".into());

        store.insert(&first).await.unwrap();
        assert!(matches!(store.insert(&second).await, Err(DatabaseError::Duplicate)));

        let stored = store.find_by_email("mina@x.com").await.unwrap().unwrap();
        assert_eq!(stored.name, "mina");
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_single_winner() {
        let store = InMemoryStore::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let user = User::new(format!("user{}", i), "race@x.com".into(), "hash".into());
                store.insert(&user).await.is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_find_recent_orders_and_bounds() {
        let store = InMemoryStore::new();
        let base = Utc::now();
        // Appended out of order on purpose.
        for offset in [3, 0, 7, 1, 12, 5, 9, 2, 11, 4, 6, 8, 10] {
            let attempt = LoginAttempt::new("mina@x.com", offset % 2 == 0, base + Duration::seconds(offset));
            store.append(&attempt).await.unwrap();
        }
        store
            .append(&LoginAttempt::new("other@x.com", true, base + Duration::days(1)))
            .await
            .unwrap();

        let recent = store.find_recent("mina@x.com", 10).await.unwrap();
        assert_eq!(recent.len(), 10);
        assert!(recent.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert_eq!(recent[0].created_at, base + Duration::seconds(12));
        assert!(recent.iter().all(|a| a.email == "mina@x.com"));

        assert!(store.find_recent("nobody@x.com", 10).await.unwrap().is_empty());
    }
}
