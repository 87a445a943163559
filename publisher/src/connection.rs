// ABOUTME: NIP-46 connection handshake and remote signing session (client side)
// ABOUTME: Kind-24133 JSON-RPC over a relay, NIP-44 transport with NIP-04 fallback

use async_trait::async_trait;
use exodus_core::{EventSigner, SignError};
use nostr_sdk::nips::{nip04, nip44};
use nostr_sdk::prelude::*;
use serde_json::json;
use std::fmt;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;

/// Errors from establishing or using a remote signing session.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Relay connection or subscription failed
    #[error("relay error: {0}")]
    Relay(String),

    /// Payload encryption or decryption failed
    #[error("encryption error: {0}")]
    Crypto(String),

    /// The signer replied with something that is not a valid response
    #[error("malformed signer reply: {0}")]
    Malformed(String),

    /// The signer answered with an error result
    #[error("signer rejected request: {0}")]
    Rejected(String),

    /// The notification channel was torn down mid-flight
    #[error("connection channel closed")]
    ChannelClosed,
}

impl ConnectionError {
    pub fn relay(msg: impl Into<String>) -> Self {
        Self::Relay(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

impl From<ConnectionError> for SignError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::ChannelClosed => SignError::channel_closed("connection channel closed"),
            other => SignError::signer(other.to_string()),
        }
    }
}

/// Connection descriptor handed out-of-band to the remote signer
/// (the excluded presentation layer renders it as a QR code).
///
/// Format: `nostrconnect://<client-pubkey>?relay=<encoded>&secret=<encoded>&name=<encoded>`
#[derive(Debug, Clone)]
pub struct ConnectDescriptor {
    pub client_pubkey: PublicKey,
    pub relay: String,
    pub secret: String,
    pub app_name: String,
}

impl ConnectDescriptor {
    pub fn to_uri(&self) -> String {
        format!(
            "nostrconnect://{}?relay={}&secret={}&name={}",
            self.client_pubkey.to_hex(),
            urlencoding::encode(&self.relay),
            urlencoding::encode(&self.secret),
            urlencoding::encode(&self.app_name),
        )
    }
}

impl fmt::Display for ConnectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

/// Entry point for the remote-signing handshake.
pub struct Handshake;

impl Handshake {
    /// Generate an ephemeral keypair and one-time secret, open the signaling
    /// subscription, and return the pending connection with its descriptor.
    pub async fn establish(relay: &str, app_name: &str) -> Result<PendingConnection, ConnectionError> {
        let app_keys = Keys::generate();
        let secret = hex::encode(rand::random::<[u8; 16]>());

        let client = Client::default();
        client
            .add_relay(relay)
            .await
            .map_err(|e| ConnectionError::relay(e.to_string()))?;
        client.connect().await;

        // Everything addressed to the ephemeral pubkey from now on
        let filter = Filter::new()
            .kind(Kind::NostrConnect)
            .pubkey(app_keys.public_key())
            .since(Timestamp::now());
        client
            .subscribe(filter, None)
            .await
            .map_err(|e| ConnectionError::relay(e.to_string()))?;

        let descriptor = ConnectDescriptor {
            client_pubkey: app_keys.public_key(),
            relay: relay.to_string(),
            secret: secret.clone(),
            app_name: app_name.to_string(),
        };

        tracing::info!(
            "Awaiting remote signer on {} (client pubkey: {})",
            relay,
            app_keys.public_key().to_hex()
        );

        Ok(PendingConnection {
            app_keys,
            secret,
            descriptor,
            client,
        })
    }
}

/// A handshake in progress: descriptor issued, remote ack not yet received.
pub struct PendingConnection {
    app_keys: Keys,
    secret: String,
    descriptor: ConnectDescriptor,
    client: Client,
}

impl PendingConnection {
    pub fn descriptor(&self) -> &ConnectDescriptor {
        &self.descriptor
    }

    /// Wait for the remote signer to acknowledge the connection.
    ///
    /// There is no internal timeout; the owner cancels by dropping this
    /// future and calling `close`. Malformed traffic on the channel is
    /// skipped, not fatal.
    pub async fn await_remote(self) -> Result<RemoteSession, ConnectionError> {
        let mut notifications = self.client.notifications();

        let signer_pubkey = loop {
            let notification = match notifications.recv().await {
                Ok(n) => n,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Connection listener lagged, skipped {} events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => return Err(ConnectionError::ChannelClosed),
            };

            let event = match notification {
                RelayPoolNotification::Event { event, .. } if event.kind == Kind::NostrConnect => {
                    event
                }
                _ => continue,
            };

            let decrypted =
                match decrypt_payload(self.app_keys.secret_key(), &event.pubkey, &event.content) {
                    Ok(d) => d,
                    Err(e) => {
                        // Noise from unrelated clients on the same relay
                        tracing::trace!("Ignoring undecryptable NIP-46 event: {}", e);
                        continue;
                    }
                };

            let reply: serde_json::Value = match serde_json::from_str(&decrypted) {
                Ok(v) => v,
                Err(e) => {
                    tracing::trace!("Ignoring malformed NIP-46 payload: {}", e);
                    continue;
                }
            };

            // A connect ack carries the secret back (nostrconnect flow) or a
            // plain "ack" (bunker-style signers)
            let result = reply["result"].as_str().unwrap_or_default();
            if result == self.secret || result == "ack" {
                break event.pubkey;
            }
            tracing::trace!("Ignoring NIP-46 reply without connect ack");
        };

        tracing::info!("Remote signer connected: {}", signer_pubkey.to_hex());

        let mut session = RemoteSession {
            client: self.client,
            app_keys: self.app_keys,
            signer_pubkey,
            user_pubkey: signer_pubkey,
        };

        // The signing pubkey can differ from the transport pubkey (signers
        // may derive a per-connection transport key)
        let user_pubkey = session.fetch_user_pubkey().await?;
        session.user_pubkey = user_pubkey;

        Ok(session)
    }

    /// Tear down the relay subscription when the caller abandons the flow.
    pub async fn close(self) {
        self.client.shutdown().await;
    }
}

/// A live remote signing session bound to one signer.
pub struct RemoteSession {
    client: Client,
    app_keys: Keys,
    signer_pubkey: PublicKey,
    user_pubkey: PublicKey,
}

impl RemoteSession {
    pub fn signer_pubkey(&self) -> PublicKey {
        self.signer_pubkey
    }

    pub fn user_pubkey(&self) -> PublicKey {
        self.user_pubkey
    }

    async fn fetch_user_pubkey(&self) -> Result<PublicKey, ConnectionError> {
        let result = self.rpc("get_public_key", vec![]).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| ConnectionError::malformed("get_public_key result is not a string"))?;
        PublicKey::from_hex(hex).map_err(|e| ConnectionError::malformed(e.to_string()))
    }

    /// One JSON-RPC round-trip with the remote signer.
    ///
    /// No timeout here: the signing gate bounds each attempt and the
    /// handshake wait is cancellation-only by design.
    pub async fn rpc(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, ConnectionError> {
        let request_id = hex::encode(rand::random::<[u8; 8]>());
        let payload = json!({
            "id": request_id,
            "method": method,
            "params": params,
        })
        .to_string();

        let encrypted = nip44::encrypt(
            self.app_keys.secret_key(),
            &self.signer_pubkey,
            &payload,
            nip44::Version::V2,
        )
        .map_err(|e| ConnectionError::Crypto(e.to_string()))?;

        // Subscribe to the stream before sending so the response cannot race us
        let mut notifications = self.client.notifications();

        let request_event = EventBuilder::new(Kind::NostrConnect, encrypted)
            .tags(vec![Tag::public_key(self.signer_pubkey)])
            .sign(&self.app_keys)
            .await
            .map_err(|e| ConnectionError::relay(e.to_string()))?;

        self.client
            .send_event(&request_event)
            .await
            .map_err(|e| ConnectionError::relay(e.to_string()))?;

        tracing::debug!("Sent NIP-46 {} request {}", method, request_id);

        loop {
            let notification = match notifications.recv().await {
                Ok(n) => n,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("RPC listener lagged, skipped {} events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => return Err(ConnectionError::ChannelClosed),
            };

            let event = match notification {
                RelayPoolNotification::Event { event, .. }
                    if event.kind == Kind::NostrConnect && event.pubkey == self.signer_pubkey =>
                {
                    event
                }
                _ => continue,
            };

            let decrypted =
                match decrypt_payload(self.app_keys.secret_key(), &event.pubkey, &event.content) {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::trace!("Ignoring undecryptable NIP-46 event: {}", e);
                        continue;
                    }
                };

            match parse_rpc_response(&decrypted) {
                Ok((id, result)) if id == request_id => return result,
                Ok(_) => continue, // response to another request
                Err(e) => {
                    tracing::trace!("Ignoring malformed NIP-46 response: {}", e);
                    continue;
                }
            }
        }
    }

    /// Tear down the relay subscription. The owner must call this when the
    /// session is no longer needed.
    pub async fn close(&self) {
        self.client.shutdown().await;
    }
}

#[async_trait]
impl EventSigner for RemoteSession {
    fn public_key(&self) -> PublicKey {
        self.user_pubkey
    }

    async fn sign_event(&self, unsigned: UnsignedEvent) -> Result<Event, SignError> {
        let result = self
            .rpc("sign_event", vec![json!(unsigned.as_json())])
            .await?;

        // Signers return the event either as a JSON string or inline
        let event = match result.as_str() {
            Some(s) => Event::from_json(s),
            None => Event::from_json(result.to_string()),
        }
        .map_err(|e| SignError::signer(format!("unparseable signed event: {e}")))?;

        event
            .verify()
            .map_err(|e| SignError::signer(format!("invalid signature from remote: {e}")))?;

        Ok(event)
    }
}

/// Decrypt a NIP-46 payload: NIP-44 first, NIP-04 fallback for older signers.
fn decrypt_payload(
    secret: &SecretKey,
    sender: &PublicKey,
    content: &str,
) -> Result<String, ConnectionError> {
    match nip44::decrypt(secret, sender, content) {
        Ok(d) => Ok(d),
        Err(nip44_err) => nip04::decrypt(secret, sender, content).map_err(|nip04_err| {
            ConnectionError::Crypto(format!(
                "NIP-44: {nip44_err}, NIP-04: {nip04_err}"
            ))
        }),
    }
}

/// Split a decrypted JSON-RPC response into (request id, result-or-error).
fn parse_rpc_response(
    decrypted: &str,
) -> Result<(String, Result<serde_json::Value, ConnectionError>), ConnectionError> {
    let reply: serde_json::Value =
        serde_json::from_str(decrypted).map_err(|e| ConnectionError::malformed(e.to_string()))?;

    let id = reply["id"]
        .as_str()
        .ok_or_else(|| ConnectionError::malformed("response without id"))?
        .to_string();

    if let Some(error) = reply["error"].as_str() {
        return Ok((id, Err(ConnectionError::Rejected(error.to_string()))));
    }

    Ok((id, Ok(reply["result"].clone())))
}
