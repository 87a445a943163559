// ABOUTME: Shared mock collaborators for publisher integration tests
// ABOUTME: In-memory media resolver, relay publisher, and signers with failure injection

use async_trait::async_trait;
use bytes::Bytes;
use exodus_core::{
    EventPublisher, EventSigner, FetchedMedia, Item, ItemId, MediaError, MediaKind, MediaRef,
    MediaResolver, Post, PostKind, PublishResult, SignError, UploadedMedia,
};
use nostr_sdk::{Event, Keys, PublicKey, UnsignedEvent};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Media resolver backed by fake bytes derived from the source URL.
#[derive(Default)]
pub struct MockMedia {
    /// Source URLs whose fetch fails.
    pub fail_fetch: HashSet<String>,
    /// Source URLs whose upload fails.
    pub fail_upload: HashSet<String>,
    /// Source URLs uploaded, in completion order.
    pub uploads: Mutex<Vec<String>>,
}

impl MockMedia {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaResolver for MockMedia {
    async fn fetch(&self, media: &MediaRef) -> Result<FetchedMedia, MediaError> {
        if self.fail_fetch.contains(&media.url) {
            return Err(MediaError::fetch(&media.url, "source not reachable"));
        }
        let bytes = Bytes::from(media.url.clone().into_bytes());
        let content_hash = hex::encode(Sha256::digest(&bytes));
        Ok(FetchedMedia {
            source_url: media.url.clone(),
            canonical_url: format!("https://host.test/{content_hash}"),
            mime_type: "image/jpeg".to_string(),
            size: bytes.len() as u64,
            content_hash,
            bytes,
        })
    }

    async fn upload(&self, media: &FetchedMedia) -> Result<UploadedMedia, MediaError> {
        if self.fail_upload.contains(&media.source_url) {
            return Err(MediaError::upload(&media.content_hash, "host rejected"));
        }
        self.uploads.lock().await.push(media.source_url.clone());
        Ok(UploadedMedia {
            url: media.canonical_url.clone(),
            content_hash: media.content_hash.clone(),
            mime_type: media.mime_type.clone(),
            size: media.size,
        })
    }
}

/// Publisher with a fixed set of healthy and unhealthy relays.
pub struct MockPublisher {
    pub ok_relays: Vec<String>,
    pub bad_relays: Vec<String>,
    /// Events that reached at least the fan-out, in publish order.
    pub published: Mutex<Vec<Event>>,
    pub cache_imports: AtomicUsize,
}

impl MockPublisher {
    pub fn healthy(relay_count: usize) -> Self {
        Self {
            ok_relays: (0..relay_count)
                .map(|i| format!("wss://relay-{i}.test"))
                .collect(),
            bad_relays: vec![],
            published: Mutex::new(vec![]),
            cache_imports: AtomicUsize::new(0),
        }
    }

    pub fn with_bad_relays(ok: usize, bad: usize) -> Self {
        let mut publisher = Self::healthy(ok);
        publisher.bad_relays = (0..bad).map(|i| format!("wss://down-{i}.test")).collect();
        publisher
    }

    pub async fn published_count(&self) -> usize {
        self.published.lock().await.len()
    }
}

#[async_trait]
impl EventPublisher for MockPublisher {
    async fn publish(&self, event: &Event) -> PublishResult {
        self.published.lock().await.push(event.clone());
        PublishResult {
            succeeded: self.ok_relays.iter().cloned().collect(),
            failed: self
                .bad_relays
                .iter()
                .map(|relay| (relay.clone(), "connection refused".to_string()))
                .collect(),
        }
    }

    async fn import_to_cache(&self, events: &[Event]) {
        self.cache_imports.fetch_add(events.len(), Ordering::SeqCst);
    }
}

/// Signer that really signs, tracks concurrency, and can hang on demand.
pub struct CountingSigner {
    keys: Keys,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub signed: AtomicUsize,
    /// Requests whose content contains this marker never complete.
    pub hang_marker: Option<String>,
}

impl CountingSigner {
    pub fn new() -> Self {
        Self {
            keys: Keys::generate(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            signed: AtomicUsize::new(0),
            hang_marker: None,
        }
    }

    pub fn with_hang_marker(marker: &str) -> Self {
        let mut signer = Self::new();
        signer.hang_marker = Some(marker.to_string());
        signer
    }
}

#[async_trait]
impl EventSigner for CountingSigner {
    fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    async fn sign_event(&self, unsigned: UnsignedEvent) -> Result<Event, SignError> {
        if let Some(marker) = &self.hang_marker {
            if unsigned.content.contains(marker) {
                // Simulates a remote signer that never answers
                futures::future::pending::<()>().await;
                unreachable!();
            }
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        // Widen the race window so overlapping callers would be caught
        tokio::time::sleep(Duration::from_millis(10)).await;
        let result = unsigned
            .sign(&self.keys)
            .await
            .map_err(|e| SignError::signer(e.to_string()));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if result.is_ok() {
            self.signed.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}

/// A post with `media_count` distinct media references.
pub fn post_item(id: &str, media_count: usize) -> Item {
    post_item_with_caption(id, media_count, &format!("caption for {id}"))
}

pub fn post_item_with_caption(id: &str, media_count: usize, caption: &str) -> Item {
    Item::Post(Post {
        id: ItemId::from(id),
        kind: if media_count > 1 {
            PostKind::Carousel
        } else {
            PostKind::Image
        },
        media: (0..media_count)
            .map(|i| MediaRef::new(format!("https://source.test/{id}/media-{i}.jpg"), MediaKind::Image))
            .collect(),
        caption: Some(caption.to_string()),
        posted_at: Some(1700000000),
    })
}
