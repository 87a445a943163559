// ABOUTME: Per-item task wrapper and its forward-only status machine
// ABOUTME: A task is owned by exactly one worker; error is terminal for the task, not the run

use crate::types::item::Item;
use nostr_sdk::EventId;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Pipeline stage of one task.
///
/// Transitions follow the strict chain
/// `pending -> downloading -> signing -> uploading -> publishing -> complete`,
/// with `error` reachable from every non-terminal state. `complete` and
/// `error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Downloading,
    Signing,
    Uploading,
    Publishing,
    Complete,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Error)
    }

    /// The single forward successor in the pipeline, if any.
    fn next(self) -> Option<TaskStatus> {
        match self {
            TaskStatus::Pending => Some(TaskStatus::Downloading),
            TaskStatus::Downloading => Some(TaskStatus::Signing),
            TaskStatus::Signing => Some(TaskStatus::Uploading),
            TaskStatus::Uploading => Some(TaskStatus::Publishing),
            TaskStatus::Publishing => Some(TaskStatus::Complete),
            TaskStatus::Complete | TaskStatus::Error => None,
        }
    }

    /// Whether a transition from `self` to `to` is legal.
    pub fn can_advance_to(self, to: TaskStatus) -> bool {
        if to == TaskStatus::Error {
            return !self.is_terminal();
        }
        self.next() == Some(to)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Signing => "signing",
            TaskStatus::Uploading => "uploading",
            TaskStatus::Publishing => "publishing",
            TaskStatus::Complete => "complete",
            TaskStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("illegal task transition {from} -> {to}")]
    IllegalTransition { from: TaskStatus, to: TaskStatus },
}

/// Orchestrator-owned wrapper around one content item.
#[derive(Debug)]
pub struct Task {
    pub item: Item,
    pub status: TaskStatus,
    pub error: Option<String>,
    /// Canonical URLs of this item's uploaded media, in source order.
    pub uploaded_urls: Vec<String>,
    /// Id of the signed event once signing succeeded.
    pub event_id: Option<EventId>,
}

impl Task {
    pub fn new(item: Item) -> Self {
        Self {
            item,
            status: TaskStatus::Pending,
            error: None,
            uploaded_urls: Vec::new(),
            event_id: None,
        }
    }

    /// Move the task forward one stage.
    pub fn advance(&mut self, to: TaskStatus) -> Result<TaskStatus, TaskError> {
        if !self.status.can_advance_to(to) {
            return Err(TaskError::IllegalTransition {
                from: self.status,
                to,
            });
        }
        let from = self.status;
        self.status = to;
        Ok(from)
    }

    /// Terminate the task with an error message. Returns the prior status.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<TaskStatus, TaskError> {
        let from = self.advance(TaskStatus::Error)?;
        self.error = Some(message.into());
        Ok(from)
    }
}
