// ABOUTME: Single-slot serialization of all remote signing requests
// ABOUTME: One outstanding round-trip site-wide, with grace delay, per-attempt timeout, and bounded retry

use async_trait::async_trait;
use exodus_core::{EventSigner, SignError};
use nostr_sdk::{Event, PublicKey, UnsignedEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};

/// Timing knobs for the gate. Production uses the defaults; tests shrink them.
#[derive(Debug, Clone)]
pub struct SigningGateConfig {
    /// Pause after the previous request completes before the next one starts,
    /// so a human approver on the remote side is not flooded.
    pub grace_delay: Duration,
    /// Hard ceiling on one signing round-trip.
    pub attempt_timeout: Duration,
    /// Retries after the first attempt fails or times out.
    pub retries: u32,
    /// Pause between attempts.
    pub retry_backoff: Duration,
}

impl Default for SigningGateConfig {
    fn default() -> Self {
        Self {
            grace_delay: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(30),
            retries: 2,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

/// Serializes signing requests against a single-capacity remote signer.
///
/// The remote side is often a human approving each request, so exactly one
/// round-trip is outstanding at any instant regardless of how many workers
/// ask concurrently. The gate implements `EventSigner` itself, so callers
/// cannot tell a gated remote identity from a local one.
pub struct SigningGate {
    inner: Arc<dyn EventSigner>,
    slot: Mutex<()>,
    config: SigningGateConfig,
}

impl SigningGate {
    pub fn new(inner: Arc<dyn EventSigner>) -> Self {
        Self::with_config(inner, SigningGateConfig::default())
    }

    pub fn with_config(inner: Arc<dyn EventSigner>, config: SigningGateConfig) -> Self {
        Self {
            inner,
            slot: Mutex::new(()),
            config,
        }
    }
}

#[async_trait]
impl EventSigner for SigningGate {
    fn public_key(&self) -> PublicKey {
        self.inner.public_key()
    }

    async fn sign_event(&self, unsigned: UnsignedEvent) -> Result<Event, SignError> {
        // The slot is held for the whole request, released on every exit
        // path; a failed request never poisons the chain for later callers.
        let _slot = self.slot.lock().await;

        sleep(self.config.grace_delay).await;

        let attempts = self.config.retries + 1;
        let mut last_error: Option<SignError> = None;

        for attempt in 1..=attempts {
            match timeout(
                self.config.attempt_timeout,
                self.inner.sign_event(unsigned.clone()),
            )
            .await
            {
                Ok(Ok(event)) => return Ok(event),
                Ok(Err(err @ SignError::ChannelClosed(_))) => {
                    // Session torn down; retrying cannot succeed
                    return Err(err);
                }
                Ok(Err(err)) => {
                    tracing::warn!(
                        "Signing attempt {}/{} failed: {}",
                        attempt,
                        attempts,
                        err
                    );
                    last_error = Some(err);
                }
                Err(_) => {
                    tracing::warn!(
                        "Signing attempt {}/{} timed out after {:?}",
                        attempt,
                        attempts,
                        self.config.attempt_timeout
                    );
                    last_error = Some(SignError::Timeout { attempts: attempt });
                }
            }

            if attempt < attempts {
                sleep(self.config.retry_backoff).await;
            }
        }

        Err(last_error.unwrap_or(SignError::Timeout { attempts }))
    }
}
