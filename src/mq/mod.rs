//! Inbound "images uploaded" messages from other services.
//!
//! Broker connectivity lives outside this crate; an adapter feeds raw
//! payloads into a [`MessageListener`] and relays the boolean reply.

use crate::services::error::LifecycleError;
use crate::services::lifecycle::LifecycleManager;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

pub const IMAGE_UPLOADED_QUEUE: &str = "images-uploaded";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfoMessage {
    pub operation: String,
    #[serde(rename = "imageUrls", default)]
    pub image_urls: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOperation {
    Confirm,
    Assert,
    Delete,
}

impl FromStr for MessageOperation {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirm" => Ok(MessageOperation::Confirm),
            "assert" => Ok(MessageOperation::Assert),
            "delete" => Ok(MessageOperation::Delete),
            other => Err(MessageError::UnsupportedOperation(other.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum MessageError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("operation '{0}' is not supported")]
    UnsupportedOperation(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

#[derive(Clone)]
pub struct ImageMessageHandler {
    lifecycle: Arc<LifecycleManager>,
}

impl ImageMessageHandler {
    pub fn new(lifecycle: Arc<LifecycleManager>) -> Self {
        Self { lifecycle }
    }

    /// Handles one message. The reply carries only success; details go to the log.
    pub async fn handle(&self, message: &ImageInfoMessage) -> bool {
        tracing::info!(
            "📨 Received {} for {} images",
            message.operation,
            message.image_urls.len()
        );
        match self.dispatch(message).await {
            Ok(()) => {
                tracing::info!("✅ {} succeeded", message.operation);
                true
            }
            Err(e) => {
                tracing::error!("❌ {} failed: {}", message.operation, e);
                false
            }
        }
    }

    pub async fn handle_payload(&self, payload: &[u8]) -> bool {
        match serde_json::from_slice::<ImageInfoMessage>(payload) {
            Ok(message) => self.handle(&message).await,
            Err(e) => {
                tracing::error!("❌ {}", MessageError::from(e));
                false
            }
        }
    }

    async fn dispatch(&self, message: &ImageInfoMessage) -> Result<(), MessageError> {
        let keys = &message.image_urls;
        match message.operation.parse::<MessageOperation>()? {
            MessageOperation::Confirm => self.lifecycle.confirm_uploads(keys).await?,
            MessageOperation::Assert => self.lifecycle.assert_uploaded_batch(keys).await?,
            MessageOperation::Delete => self.lifecycle.delete_images(keys).await?,
        }
        Ok(())
    }
}

/// A raw payload plus the channel its acknowledgment goes back on.
pub struct MessageEnvelope {
    pub payload: Vec<u8>,
    pub reply: oneshot::Sender<bool>,
}

/// Consumes envelopes one at a time until the inbox closes or shutdown fires.
pub struct MessageListener {
    handler: ImageMessageHandler,
    inbox: mpsc::Receiver<MessageEnvelope>,
    shutdown: watch::Receiver<bool>,
}

impl MessageListener {
    pub fn new(
        handler: ImageMessageHandler,
        inbox: mpsc::Receiver<MessageEnvelope>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            handler,
            inbox,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("👂 Listening on queue '{}'", IMAGE_UPLOADED_QUEUE);

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Message listener shutting down");
                    break;
                }
                envelope = self.inbox.recv() => {
                    let Some(envelope) = envelope else {
                        tracing::info!("Inbox for '{}' closed", IMAGE_UPLOADED_QUEUE);
                        break;
                    };
                    let ok = self.handler.handle_payload(&envelope.payload).await;
                    if envelope.reply.send(ok).is_err() {
                        tracing::warn!("Sender dropped before the acknowledgment was delivered");
                    }
                }
            }
        }
    }
}
