// ABOUTME: Fan-out of signed events to the configured relay set
// ABOUTME: Maps relay pool output into a success/failure split; cache import is best-effort

use crate::connection::ConnectionError;
use async_trait::async_trait;
use exodus_core::{EventPublisher, PublishResult};
use nostr_sdk::prelude::*;
use std::time::Duration;

const HTTP_TIMEOUT_SECS: u64 = 30;

/// Publishes signed events to every relay in the configured set.
pub struct RelayPublisher {
    client: Client,
    relays: Vec<String>,
    http: reqwest::Client,
    cache_import_url: Option<String>,
}

impl RelayPublisher {
    /// Connect the relay pool. The relay set is fixed for the lifetime of
    /// the publisher.
    pub async fn connect(
        relays: &[String],
        cache_import_url: Option<String>,
    ) -> Result<Self, ConnectionError> {
        let client = Client::default();
        for relay in relays {
            client
                .add_relay(relay.as_str())
                .await
                .map_err(|e| ConnectionError::relay(e.to_string()))?;
        }
        client.connect().await;

        tracing::info!("Connected to {} relay(s) for publishing: {:?}", relays.len(), relays);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Ok(Self {
            client,
            relays: relays.to_vec(),
            http,
            cache_import_url,
        })
    }

    /// Disconnect from all relays.
    pub async fn shutdown(&self) {
        self.client.shutdown().await;
    }
}

#[async_trait]
impl EventPublisher for RelayPublisher {
    async fn publish(&self, event: &Event) -> PublishResult {
        match self.client.send_event(event).await {
            Ok(output) => PublishResult {
                succeeded: output.success.iter().map(|url| url.to_string()).collect(),
                failed: output
                    .failed
                    .iter()
                    .map(|(url, reason)| (url.to_string(), reason.clone()))
                    .collect(),
            },
            Err(e) => {
                // The pool refused outright; every configured relay counts
                // as failed with the same reason
                let reason = e.to_string();
                tracing::warn!("Publish of {} failed on all relays: {}", event.id, reason);
                PublishResult {
                    succeeded: Default::default(),
                    failed: self
                        .relays
                        .iter()
                        .map(|relay| (relay.clone(), reason.clone()))
                        .collect(),
                }
            }
        }
    }

    async fn import_to_cache(&self, events: &[Event]) {
        let Some(url) = &self.cache_import_url else {
            return;
        };
        if events.is_empty() {
            return;
        }

        match self.http.post(url).json(&events).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Imported {} event(s) to cache", events.len());
            }
            Ok(response) => {
                tracing::warn!("Cache import returned status {}", response.status());
            }
            Err(e) => {
                tracing::warn!("Cache import failed: {}", e);
            }
        }
    }
}
