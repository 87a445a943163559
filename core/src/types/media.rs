// ABOUTME: Media reference and resolution types for the content-addressed upload pipeline
// ABOUTME: A MediaRef is fetched into FetchedMedia (bytes + hash) before the event is signed

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// A reference to one media object in the source system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub kind: MediaKind,
    #[serde(default)]
    pub dimensions: Option<(u32, u32)>,
    #[serde(default)]
    pub duration_secs: Option<u32>,
}

impl MediaRef {
    pub fn new(url: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            url: url.into(),
            kind,
            dimensions: None,
            duration_secs: None,
        }
    }
}

/// Raw media bytes plus the content hash that addresses them.
///
/// Produced by the downloading stage. The canonical URL is derived from the
/// hash alone, so the event can be built and signed before any byte reaches
/// the storage host.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub source_url: String,
    pub bytes: Bytes,
    /// Hex-encoded SHA-256 of the raw bytes.
    pub content_hash: String,
    pub mime_type: String,
    pub size: u64,
    /// Hash-derived retrieval URL on the content-addressed host.
    pub canonical_url: String,
}

/// Outcome of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedMedia {
    pub url: String,
    pub content_hash: String,
    pub mime_type: String,
    pub size: u64,
}

/// Errors from media resolution (fetch or upload).
#[derive(Debug, Error)]
pub enum MediaError {
    /// Could not obtain the raw bytes for a media reference
    #[error("media fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Storage host rejected the upload or the transport failed
    #[error("upload failed for {hash}: {reason}")]
    UploadFailed { hash: String, reason: String },

    /// Could not produce the signed upload authorization
    #[error("upload authorization failed: {0}")]
    Auth(String),
}

impl MediaError {
    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn upload(hash: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UploadFailed {
            hash: hash.into(),
            reason: reason.into(),
        }
    }
}
