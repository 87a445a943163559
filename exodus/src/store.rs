// ABOUTME: File-backed checkpoint store for CLI runs
// ABOUTME: A JSON state file makes interrupted migrations resumable across processes

use async_trait::async_trait;
use exodus_core::{CheckpointError, CheckpointStore, ItemId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::sync::RwLock;

#[derive(Debug, Default, Serialize, Deserialize)]
struct State {
    published: HashSet<String>,
    completed_runs: HashSet<String>,
}

/// Checkpoint store persisted as a JSON file next to the items file.
///
/// Every write rewrites the whole file; migration runs are small enough
/// that durability beats cleverness here.
pub struct FileCheckpointStore {
    path: PathBuf,
    state: RwLock<State>,
}

impl FileCheckpointStore {
    pub fn load(path: PathBuf) -> Result<Self, CheckpointError> {
        let state = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| CheckpointError::Store(format!("corrupt state file: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => State::default(),
            Err(e) => return Err(CheckpointError::Store(e.to_string())),
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    async fn persist(&self, state: &State) -> Result<(), CheckpointError> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| CheckpointError::Store(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| CheckpointError::Store(e.to_string()))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn is_published(&self, item: &ItemId) -> Result<bool, CheckpointError> {
        Ok(self.state.read().await.published.contains(item.as_str()))
    }

    async fn mark_published(&self, item: &ItemId) -> Result<(), CheckpointError> {
        let mut state = self.state.write().await;
        state.published.insert(item.as_str().to_string());
        self.persist(&state).await
    }

    async fn mark_complete(&self, run_id: &str) -> Result<(), CheckpointError> {
        let mut state = self.state.write().await;
        state.completed_runs.insert(run_id.to_string());
        self.persist(&state).await
    }
}
