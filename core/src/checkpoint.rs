// ABOUTME: Durable checkpoint seam: records which items have been published
// ABOUTME: Writes are idempotent by item id so repeated or concurrent calls are safe

use crate::types::item::ItemId;
use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint store error: {0}")]
    Store(String),
}

/// Durable record of migration progress, keyed by item id.
///
/// All operations must be safe to call more than once; the orchestrator
/// relies on idempotency, never on exactly-once delivery.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn is_published(&self, item: &ItemId) -> Result<bool, CheckpointError>;

    async fn mark_published(&self, item: &ItemId) -> Result<(), CheckpointError>;

    async fn mark_complete(&self, run_id: &str) -> Result<(), CheckpointError>;
}

/// In-memory store for tests and single-shot CLI runs.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    published: RwLock<HashSet<ItemId>>,
    completed_runs: RwLock<HashSet<String>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published_count(&self) -> usize {
        self.published.read().await.len()
    }

    pub async fn run_completed(&self, run_id: &str) -> bool {
        self.completed_runs.read().await.contains(run_id)
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn is_published(&self, item: &ItemId) -> Result<bool, CheckpointError> {
        Ok(self.published.read().await.contains(item))
    }

    async fn mark_published(&self, item: &ItemId) -> Result<(), CheckpointError> {
        self.published.write().await.insert(item.clone());
        Ok(())
    }

    async fn mark_complete(&self, run_id: &str) -> Result<(), CheckpointError> {
        self.completed_runs.write().await.insert(run_id.to_string());
        Ok(())
    }
}
