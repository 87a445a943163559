// ABOUTME: Core domain model for the exodus migration tool
// ABOUTME: Types, configuration, pure event builders, and the seam traits between components

pub mod checkpoint;
pub mod config;
pub mod event_builder;
pub mod progress;
pub mod signing;
pub mod traits;
pub mod types;

// Re-export the types most callers need
pub use checkpoint::{CheckpointError, CheckpointStore, MemoryCheckpointStore};
pub use config::MigrationConfig;
pub use progress::{create_channel, ProgressReceiver, ProgressSender, TaskTransition};
pub use signing::{EventSigner, LocalSigner, SignError};
pub use traits::{EventPublisher, MediaResolver, PublishResult};
pub use types::item::{Article, Item, ItemId, Post, PostKind, ProfileUpdate};
pub use types::media::{FetchedMedia, MediaError, MediaKind, MediaRef, UploadedMedia};
pub use types::task::{Task, TaskError, TaskStatus};
