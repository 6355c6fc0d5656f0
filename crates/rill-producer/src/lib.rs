//! Subscription-to-broker forwarding pipeline.
//!
//! A [`Producer`] bridges a channel of typed notifications to an
//! asynchronous broker client: each notification is encoded into an
//! [`EncodedMessage`] and forwarded FIFO to the broker's input channel,
//! while dedicated workers drain the broker's success and error streams
//! into the encoder's observability hooks.

pub mod broker;
pub mod encode;
pub mod producer;

pub use broker::{BrokerClient, DeliveryFailure};
pub use encode::{EncodeError, EncodedMessage, Encoder, JsonEncoder, MessageMetadata};
pub use producer::{Producer, ProducerWriter, WriteError};
