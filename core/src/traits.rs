// ABOUTME: Seam traits between the orchestrator and its collaborators
// ABOUTME: Media resolution and relay publishing are trait objects so tests can substitute them

use crate::types::media::{FetchedMedia, MediaError, MediaRef, UploadedMedia};
use async_trait::async_trait;
use nostr_sdk::Event;
use std::collections::{HashMap, HashSet};

/// Per-event publish outcome: which relay endpoints accepted the event and
/// which rejected or timed out. Partial failure is a result, never an error.
#[derive(Debug, Clone, Default)]
pub struct PublishResult {
    pub succeeded: HashSet<String>,
    /// Failed endpoint -> reason.
    pub failed: HashMap<String, String>,
}

impl PublishResult {
    pub fn meets_quorum(&self, quorum: usize) -> bool {
        self.succeeded.len() >= quorum
    }

    /// One-line summary of the failed side, for task error messages.
    pub fn failure_summary(&self) -> String {
        let mut entries: Vec<String> = self
            .failed
            .iter()
            .map(|(relay, reason)| format!("{relay}: {reason}"))
            .collect();
        entries.sort();
        entries.join("; ")
    }
}

/// Resolves a media reference into bytes (fetch) and pushes those bytes to
/// the content-addressed host (upload). The two halves are separate because
/// the event is signed in between.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn fetch(&self, media: &MediaRef) -> Result<FetchedMedia, MediaError>;

    async fn upload(&self, media: &FetchedMedia) -> Result<UploadedMedia, MediaError>;
}

/// Fans a signed event out to the configured relay set.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Always returns the success/failure split; the caller decides quorum.
    async fn publish(&self, event: &Event) -> PublishResult;

    /// Best-effort side channel for immediate read-after-write visibility.
    /// Failures are logged and swallowed by implementations.
    async fn import_to_cache(&self, events: &[Event]);
}
