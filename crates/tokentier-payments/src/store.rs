//! Subscription Storage
//!
//! One row per user. Writes are upserts keyed by `user_id`, so replaying the
//! same write leaves the row unchanged.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tokentier_core::Subscription;

use crate::error::Result;

/// Subscription storage trait
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert or replace the user's row. An existing row keeps its `id` and
    /// `created_at`. Returns the stored row.
    async fn upsert(&self, subscription: &Subscription) -> Result<Subscription>;

    /// The user's active row, if any
    async fn find_active(&self, user_id: &str) -> Result<Option<Subscription>>;

    /// Reset the user's balance to `tokens`. Returns false if the user has no row.
    async fn grant_tokens(&self, user_id: &str, tokens: u64, now: DateTime<Utc>) -> Result<bool>;
}

/// The user's active subscription, creating the free default on first load
pub async fn load_or_create(
    store: &dyn SubscriptionStore,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Subscription> {
    if let Some(existing) = store.find_active(user_id).await? {
        return Ok(existing);
    }

    tracing::info!(user_id = %user_id, "Creating default subscription");
    store.upsert(&Subscription::default_for(user_id, now)).await
}

/// In-memory subscription store (for development)
#[derive(Default)]
pub struct MemorySubscriptionStore {
    rows: RwLock<HashMap<String, Subscription>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row for the user regardless of `is_active`
    pub async fn get(&self, user_id: &str) -> Option<Subscription> {
        self.rows.read().await.get(user_id).cloned()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn upsert(&self, subscription: &Subscription) -> Result<Subscription> {
        let mut rows = self.rows.write().await;

        let mut row = subscription.clone();
        if let Some(existing) = rows.get(&row.user_id) {
            row.id.clone_from(&existing.id);
            row.created_at = existing.created_at;
        }

        rows.insert(row.user_id.clone(), row.clone());
        Ok(row)
    }

    async fn find_active(&self, user_id: &str) -> Result<Option<Subscription>> {
        let rows = self.rows.read().await;
        Ok(rows.get(user_id).filter(|row| row.is_active).cloned())
    }

    async fn grant_tokens(&self, user_id: &str, tokens: u64, now: DateTime<Utc>) -> Result<bool> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(user_id) {
            Some(row) => {
                row.grant_tokens(tokens, now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
