// ABOUTME: UI-agnostic progress channel emitting task status transitions
// ABOUTME: The presentation layer subscribes to the receiver; the orchestrator owns no UI dependency

use crate::types::item::ItemId;
use crate::types::task::TaskStatus;
use serde::Serialize;
use tokio::sync::mpsc;

/// Buffer size for the progress channel. Transitions are small and consumers
/// are expected to keep up; a full buffer drops the event rather than
/// blocking the worker.
pub const CHANNEL_BUFFER_SIZE: usize = 256;

/// One observed status change on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskTransition {
    pub item_id: ItemId,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

pub type ProgressSender = mpsc::Sender<TaskTransition>;
pub type ProgressReceiver = mpsc::Receiver<TaskTransition>;

/// Create the progress channel pair.
pub fn create_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::channel(CHANNEL_BUFFER_SIZE)
}
