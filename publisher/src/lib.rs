// ABOUTME: Library interface for the exodus publishing pipeline
// ABOUTME: Exports the handshake, signing gate, media uploader, relay publisher, and orchestrator

pub mod connection;
pub mod error;
pub mod media;
pub mod orchestrator;
pub mod relay;
pub mod signing_gate;

// Re-export main types for convenience
pub use connection::{
    ConnectDescriptor, ConnectionError, Handshake, PendingConnection, RemoteSession,
};
pub use error::{PublishError, PublisherResult};
pub use media::{MediaUploader, MediaUploaderConfig};
pub use orchestrator::{MigrationRun, Orchestrator, RunReport};
pub use relay::RelayPublisher;
pub use signing_gate::{SigningGate, SigningGateConfig};
