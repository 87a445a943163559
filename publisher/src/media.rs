// ABOUTME: Media resolution against the content-addressed storage host
// ABOUTME: Cache-or-proxy byte fetch, SHA-256 addressing, ephemeral-key upload authorization

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use exodus_core::event_builder;
use exodus_core::{FetchedMedia, MediaError, MediaKind, MediaRef, MediaResolver, UploadedMedia};
use moka::future::Cache;
use nostr_sdk::{Keys, Timestamp};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Entries in the prefetch byte cache.
const BYTE_CACHE_CAPACITY: u64 = 512;

/// Lifetime of one upload authorization.
const UPLOAD_AUTH_TTL_SECS: u64 = 600;

const HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct MediaUploaderConfig {
    /// Base URL of the content-addressed host.
    pub host: String,
    /// Optional authenticated proxy for fetching source bytes
    /// (avoids cross-origin/auth issues with the source host).
    pub proxy: Option<String>,
}

/// Fetches media bytes and pushes them to the content-addressed host.
///
/// Upload authorizations are signed with a keypair generated for this
/// uploader: the host is content-addressed and does not care who authorized
/// the write, and this keeps remote signing round-trips off the media path.
pub struct MediaUploader {
    http: reqwest::Client,
    cache: Cache<String, Bytes>,
    auth_keys: Keys,
    config: MediaUploaderConfig,
}

impl MediaUploader {
    pub fn new(config: MediaUploaderConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            cache: Cache::new(BYTE_CACHE_CAPACITY),
            auth_keys: Keys::generate(),
            config,
        }
    }

    /// Warm the byte cache ahead of the run. Best-effort: failures are
    /// logged and retried by the per-task fetch later.
    pub async fn prefetch(&self, refs: &[MediaRef]) {
        for media in refs {
            if self.cache.get(&media.url).await.is_some() {
                continue;
            }
            match self.get_bytes(&media.url).await {
                Ok(bytes) => {
                    tracing::debug!("Prefetched {} ({} bytes)", media.url, bytes.len());
                }
                Err(e) => {
                    tracing::warn!("Prefetch failed for {}: {}", media.url, e);
                }
            }
        }
    }

    fn fetch_url(&self, source: &str) -> String {
        match &self.config.proxy {
            Some(proxy) => format!("{}?url={}", proxy, urlencoding::encode(source)),
            None => source.to_string(),
        }
    }

    async fn get_bytes(&self, source: &str) -> Result<Bytes, MediaError> {
        if let Some(bytes) = self.cache.get(source).await {
            tracing::trace!("Byte cache hit for {}", source);
            return Ok(bytes);
        }

        let url = self.fetch_url(source);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| MediaError::fetch(source, e.to_string()))?;

        if !response.status().is_success() {
            return Err(MediaError::fetch(
                source,
                format!("status {}", response.status()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| MediaError::fetch(source, e.to_string()))?;

        self.cache.insert(source.to_string(), bytes.clone()).await;
        Ok(bytes)
    }
}

#[async_trait]
impl MediaResolver for MediaUploader {
    async fn fetch(&self, media: &MediaRef) -> Result<FetchedMedia, MediaError> {
        let bytes = self.get_bytes(&media.url).await?;
        let content_hash = hex::encode(Sha256::digest(&bytes));
        let size = bytes.len() as u64;

        Ok(FetchedMedia {
            source_url: media.url.clone(),
            canonical_url: hash_url(&self.config.host, &content_hash),
            mime_type: mime_for(media).to_string(),
            content_hash,
            size,
            bytes,
        })
    }

    async fn upload(&self, media: &FetchedMedia) -> Result<UploadedMedia, MediaError> {
        let expires_at = Timestamp::from(Timestamp::now().as_secs() + UPLOAD_AUTH_TTL_SECS);
        let auth = event_builder::upload_auth(
            self.auth_keys.public_key(),
            &media.content_hash,
            media.size,
            expires_at,
        );
        let signed_auth = auth
            .sign(&self.auth_keys)
            .await
            .map_err(|e| MediaError::Auth(e.to_string()))?;
        let auth_header = format!(
            "Nostr {}",
            base64::engine::general_purpose::STANDARD.encode(signed_auth.as_json())
        );

        let response = self
            .http
            .put(format!("{}/upload", self.config.host))
            .header("Authorization", auth_header)
            .header("Content-Type", &media.mime_type)
            .header("X-SHA-256", &media.content_hash)
            .body(media.bytes.clone())
            .send()
            .await
            .map_err(|e| MediaError::upload(&media.content_hash, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::upload(
                &media.content_hash,
                format!("status {status}: {body}"),
            ));
        }

        // The host may return a descriptor with the retrieval URL; fall back
        // to the hash-derived one when it does not
        let descriptor: serde_json::Value = response.json().await.unwrap_or_default();
        if let Some(host_hash) = descriptor["sha256"].as_str() {
            if !host_hash.eq_ignore_ascii_case(&media.content_hash) {
                return Err(MediaError::upload(
                    &media.content_hash,
                    format!("host returned mismatched hash {host_hash}"),
                ));
            }
        }
        let url = descriptor["url"]
            .as_str()
            .map(|s| s.to_string())
            .unwrap_or_else(|| media.canonical_url.clone());

        tracing::debug!("Uploaded {} ({} bytes) -> {}", media.content_hash, media.size, url);

        Ok(UploadedMedia {
            url,
            content_hash: media.content_hash.clone(),
            mime_type: media.mime_type.clone(),
            size: media.size,
        })
    }
}

fn hash_url(host: &str, content_hash: &str) -> String {
    format!("{}/{}", host.trim_end_matches('/'), content_hash)
}

/// Content type from the URL extension, with a per-kind default.
fn mime_for(media: &MediaRef) -> &'static str {
    let path = media.url.split(['?', '#']).next().unwrap_or_default();
    let extension = path.rsplit('.').next().unwrap_or_default();
    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "jpg" | "jpeg" => "image/jpeg",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => match media.kind {
            MediaKind::Image => "image/jpeg",
            MediaKind::Video => "video/mp4",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploader_with_proxy(proxy: Option<&str>) -> MediaUploader {
        MediaUploader::new(MediaUploaderConfig {
            host: "https://blossom.example.com".to_string(),
            proxy: proxy.map(|s| s.to_string()),
        })
    }

    #[test]
    fn test_hash_url_strips_trailing_slash() {
        assert_eq!(
            hash_url("https://host.example/", "abc123"),
            "https://host.example/abc123"
        );
        assert_eq!(
            hash_url("https://host.example", "abc123"),
            "https://host.example/abc123"
        );
    }

    #[test]
    fn test_mime_for_extension_and_fallback() {
        let png = MediaRef::new("https://cdn.example.com/x.PNG", MediaKind::Image);
        assert_eq!(mime_for(&png), "image/png");

        let query = MediaRef::new("https://cdn.example.com/x.jpg?sig=1", MediaKind::Image);
        assert_eq!(mime_for(&query), "image/jpeg");

        let bare_image = MediaRef::new("https://cdn.example.com/media/123", MediaKind::Image);
        assert_eq!(mime_for(&bare_image), "image/jpeg");

        let bare_video = MediaRef::new("https://cdn.example.com/media/456", MediaKind::Video);
        assert_eq!(mime_for(&bare_video), "video/mp4");
    }

    #[test]
    fn test_proxy_url_encoding() {
        let uploader = uploader_with_proxy(Some("https://proxy.example.com/fetch"));
        assert_eq!(
            uploader.fetch_url("https://cdn.example.com/a.jpg?x=1"),
            "https://proxy.example.com/fetch?url=https%3A%2F%2Fcdn.example.com%2Fa.jpg%3Fx%3D1"
        );

        let direct = uploader_with_proxy(None);
        assert_eq!(
            direct.fetch_url("https://cdn.example.com/a.jpg"),
            "https://cdn.example.com/a.jpg"
        );
    }

    #[tokio::test]
    async fn test_fetch_served_from_cache_without_network() {
        let uploader = uploader_with_proxy(None);
        let source = "https://unreachable.invalid/a.jpg";
        let payload = Bytes::from_static(b"fake image bytes");
        uploader.cache.insert(source.to_string(), payload.clone()).await;

        let media = MediaRef::new(source, MediaKind::Image);
        let fetched = uploader.fetch(&media).await.unwrap();

        assert_eq!(fetched.bytes, payload);
        assert_eq!(fetched.size, payload.len() as u64);
        assert_eq!(
            fetched.content_hash,
            hex::encode(Sha256::digest(&payload))
        );
        assert_eq!(
            fetched.canonical_url,
            format!("https://blossom.example.com/{}", fetched.content_hash)
        );
    }

    #[tokio::test]
    async fn test_upload_auth_event_binds_hash() {
        // Build and sign the authorization the way upload() does, then check
        // what the host would see after base64 decoding
        let keys = Keys::generate();
        let auth = event_builder::upload_auth(
            keys.public_key(),
            "cafe1234",
            42,
            Timestamp::from(Timestamp::now().as_secs() + UPLOAD_AUTH_TTL_SECS),
        );
        let signed = auth.sign(&keys).await.unwrap();
        let header = format!(
            "Nostr {}",
            base64::engine::general_purpose::STANDARD.encode(signed.as_json())
        );

        let encoded = header.strip_prefix("Nostr ").unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        let event: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(
            event["kind"].as_u64(),
            Some(event_builder::UPLOAD_AUTH_KIND as u64)
        );
        let tags = event["tags"].as_array().unwrap();
        assert!(tags.iter().any(|t| t[0] == "x" && t[1] == "cafe1234"));
        assert!(tags.iter().any(|t| t[0] == "t" && t[1] == "upload"));
    }
}
