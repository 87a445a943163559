// ABOUTME: The EventSigner seam shared by local keys and gated remote sessions
// ABOUTME: LocalSigner signs in-process; remote signing lives in the publisher crate

use async_trait::async_trait;
use nostr_sdk::{Event, Keys, PublicKey, UnsignedEvent};
use thiserror::Error;

/// Errors from producing a signed event.
#[derive(Debug, Error)]
pub enum SignError {
    /// The signer rejected the request or the signature could not be produced
    #[error("signing failed: {0}")]
    Signer(String),

    /// Remote signer did not answer within the allowed attempts
    #[error("signing timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    /// The underlying signing channel was torn down mid-flight
    #[error("signing channel closed: {0}")]
    ChannelClosed(String),
}

impl SignError {
    pub fn signer(msg: impl Into<String>) -> Self {
        Self::Signer(msg.into())
    }

    pub fn channel_closed(msg: impl Into<String>) -> Self {
        Self::ChannelClosed(msg.into())
    }
}

/// A signing identity for a migration run.
///
/// Exactly one signer governs all tasks in a run. Implementations are either
/// a locally held key (signs synchronously, no gating) or a remote session
/// wrapped in the signing gate.
#[async_trait]
pub trait EventSigner: Send + Sync {
    /// The author pubkey events are built for.
    fn public_key(&self) -> PublicKey;

    async fn sign_event(&self, unsigned: UnsignedEvent) -> Result<Event, SignError>;
}

/// A secret key held in memory, authorized to sign directly.
pub struct LocalSigner {
    keys: Keys,
}

impl LocalSigner {
    pub fn new(keys: Keys) -> Self {
        Self { keys }
    }

    /// Parse a secret key in hex or bech32 nsec form.
    pub fn parse(secret: &str) -> Result<Self, SignError> {
        let keys = Keys::parse(secret).map_err(|e| SignError::signer(e.to_string()))?;
        Ok(Self::new(keys))
    }

    pub fn keys(&self) -> &Keys {
        &self.keys
    }
}

#[async_trait]
impl EventSigner for LocalSigner {
    fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    async fn sign_event(&self, unsigned: UnsignedEvent) -> Result<Event, SignError> {
        unsigned
            .sign(&self.keys)
            .await
            .map_err(|e| SignError::signer(e.to_string()))
    }
}
