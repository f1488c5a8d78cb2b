//! Single-use correlation ids for CSRF protection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

#[async_trait]
pub trait CorrelationStore: Send + Sync {
    /// Remember a freshly minted correlation id until `expires_at`.
    async fn issue(&self, correlation_id: &str, expires_at: DateTime<Utc>);

    /// Remove the id and report whether it was live. A second call for the
    /// same id always returns `false`.
    async fn consume(&self, correlation_id: &str) -> bool;

    /// Drop expired ids, returning how many were removed.
    async fn cleanup_expired(&self) -> usize;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCorrelationStore {
    ids: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl InMemoryCorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.ids.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.ids.read().await.is_empty()
    }
}

#[async_trait]
impl CorrelationStore for InMemoryCorrelationStore {
    /// Expired ids are pruned on every issue, so abandoned sign-ins do not
    /// accumulate.
    async fn issue(&self, correlation_id: &str, expires_at: DateTime<Utc>) {
        let mut ids = self.ids.write().await;
        let now = Utc::now();
        ids.retain(|_, live_until| now <= *live_until);
        ids.insert(correlation_id.to_string(), expires_at);
    }

    async fn consume(&self, correlation_id: &str) -> bool {
        let mut ids = self.ids.write().await;
        match ids.remove(correlation_id) {
            Some(expires_at) => Utc::now() <= expires_at,
            None => false,
        }
    }

    async fn cleanup_expired(&self) -> usize {
        let mut ids = self.ids.write().await;
        let now = Utc::now();
        let before = ids.len();
        ids.retain(|_, expires_at| now <= *expires_at);
        let removed = before - ids.len();
        if removed > 0 {
            tracing::debug!(removed, "dropped expired correlation ids");
        }
        removed
    }
}
