//! Notification-to-message encoding.

use bytes::Bytes;
use std::fmt;
use std::time::SystemTime;

use rill_gnmi::Notification;

use crate::broker::DeliveryFailure;

/// Delivery metadata attached to every encoded message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MessageMetadata {
    /// When encoding of this message began.
    pub start_time: SystemTime,
    /// Number of source notifications folded into this message.
    pub num_messages: u64,
}

/// One message bound for the broker input channel.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedMessage {
    pub topic: String,
    pub key: Bytes,
    pub payload: Bytes,
    pub metadata: MessageMetadata,
}

#[derive(Debug)]
pub enum EncodeError {
    /// The notification is recognized and deliberately skipped; the
    /// pipeline drops it without error.
    UnhandledNotification,
    /// The encoder could not represent the notification. The pipeline
    /// treats this as a programmer error and aborts.
    Invalid(String),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnhandledNotification => write!(f, "unhandled notification"),
            Self::Invalid(detail) => write!(f, "{detail}"),
        }
    }
}

impl std::error::Error for EncodeError {}

/// Converts notifications into broker messages and observes their
/// delivery outcomes.
pub trait Encoder: Send + Sync + 'static {
    fn encode(&self, notification: &Notification) -> Result<EncodedMessage, EncodeError>;

    /// Called once per message the broker confirmed.
    fn handle_success(&self, message: EncodedMessage) {
        let _ = message;
    }

    /// Called once per message the broker rejected. Never fatal.
    fn handle_error(&self, failure: DeliveryFailure) {
        let _ = failure;
    }
}

/// Reference encoder: JSON payloads keyed by the notification prefix.
pub struct JsonEncoder {
    topic: String,
}

impl JsonEncoder {
    pub fn new(topic: impl Into<String>) -> JsonEncoder {
        JsonEncoder {
            topic: topic.into(),
        }
    }
}

impl Encoder for JsonEncoder {
    fn encode(&self, notification: &Notification) -> Result<EncodedMessage, EncodeError> {
        if notification.updates.is_empty() && notification.deletes.is_empty() {
            // Keepalives and empty syncs carry nothing worth publishing.
            return Err(EncodeError::UnhandledNotification);
        }
        let payload = serde_json::to_vec(notification)
            .map_err(|err| EncodeError::Invalid(err.to_string()))?;
        Ok(EncodedMessage {
            topic: self.topic.clone(),
            key: Bytes::from(notification.prefix.to_string().into_bytes()),
            payload: Bytes::from(payload),
            metadata: MessageMetadata {
                start_time: SystemTime::now(),
                num_messages: 1,
            },
        })
    }

    fn handle_success(&self, message: EncodedMessage) {
        tracing::debug!(topic = %message.topic, bytes = message.payload.len(), "delivered");
    }

    fn handle_error(&self, failure: DeliveryFailure) {
        tracing::warn!(
            topic = %failure.message.topic,
            error = %failure.detail,
            "delivery failed",
        );
    }
}
