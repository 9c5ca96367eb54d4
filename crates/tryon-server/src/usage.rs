//! Per-owner usage accounting, invoked after successful submission.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use tryon_core::UserId;

/// Callback for owner usage counters. Account management itself is an
/// external collaborator; the orchestrator only reports submissions.
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    async fn record_submission(&self, owner: &UserId);
}

/// In-memory usage counters.
#[derive(Default)]
pub struct InMemoryUsage {
    counts: RwLock<HashMap<UserId, u64>>,
}

impl InMemoryUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total submissions recorded for an owner.
    pub async fn submissions(&self, owner: &UserId) -> u64 {
        self.counts.read().await.get(owner).copied().unwrap_or(0)
    }
}

#[async_trait]
impl UsageRecorder for InMemoryUsage {
    async fn record_submission(&self, owner: &UserId) {
        *self.counts.write().await.entry(owner.clone()).or_insert(0) += 1;
    }
}
