//! The asynchronous broker seam.
//!
//! The pipeline never talks to a concrete broker driver; it holds a
//! [`BrokerClient`], whose channels mirror the driver's native surface:
//! one FIFO input, one success stream, one error stream, and a close
//! operation that shuts the driver down and closes both outbound streams
//! after draining.

use std::future::Future;

use tokio::sync::mpsc;

use crate::encode::EncodedMessage;

/// A message the broker could not deliver, with the driver's reason.
#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    pub message: EncodedMessage,
    pub detail: String,
}

/// Handle to an asynchronous broker driver.
///
/// The success and error receivers are taken exactly once, at pipeline
/// start; taking one twice is a programmer error and panics.
pub trait BrokerClient: Send + 'static {
    /// FIFO input channel into the driver.
    fn input(&self) -> mpsc::Sender<EncodedMessage>;

    /// Stream of delivered messages.
    fn take_successes(&mut self) -> mpsc::Receiver<EncodedMessage>;

    /// Stream of failed messages.
    fn take_errors(&mut self) -> mpsc::Receiver<DeliveryFailure>;

    /// Stops the driver. Both outbound streams close once drained; the
    /// input channel stops accepting messages.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
