//! The forwarding pipeline.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use rill_gnmi::Notification;

use crate::broker::{BrokerClient, DeliveryFailure};
use crate::encode::{EncodeError, EncodedMessage, Encoder};

const DEFAULT_INPUT_CAPACITY: usize = 64;

#[derive(Debug, PartialEq, Eq)]
pub enum WriteError {
    /// The pipeline has stopped; the notification was not accepted.
    Stopped,
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "producer stopped"),
        }
    }
}

impl std::error::Error for WriteError {}

/// Write half of a producer with a private input channel. Cheap to clone.
#[derive(Clone)]
pub struct ProducerWriter {
    input: mpsc::Sender<Notification>,
    token: CancellationToken,
}

impl ProducerWriter {
    /// Queues a notification, waiting for channel capacity. Returns
    /// [`WriteError::Stopped`] once the pipeline shut down; a writer
    /// racing [`Producer::stop`] may see its last notifications dropped.
    pub async fn write(&self, notification: Notification) -> Result<(), WriteError> {
        tokio::select! {
            _ = self.token.cancelled() => Err(WriteError::Stopped),
            sent = self.input.send(notification) => sent.map_err(|_| WriteError::Stopped),
        }
    }
}

/// The running pipeline. Dropping it without calling [`Producer::stop`]
/// aborts the workers mid-message; stop is the orderly shutdown path.
pub struct Producer<B> {
    broker: B,
    token: CancellationToken,
    workers: JoinSet<()>,
}

impl<B: BrokerClient> Producer<B> {
    /// Starts the pipeline with a private input channel and returns the
    /// write half alongside it.
    pub fn start(encoder: Arc<dyn Encoder>, broker: B) -> (Producer<B>, ProducerWriter) {
        let (input, notifications) = mpsc::channel(DEFAULT_INPUT_CAPACITY);
        let producer = Producer::start_with_channel(encoder, broker, notifications);
        let writer = ProducerWriter {
            input,
            token: producer.token.clone(),
        };
        (producer, writer)
    }

    /// Starts the pipeline over a caller-owned notification channel,
    /// e.g. one fed directly by a subscriber.
    pub fn start_with_channel(
        encoder: Arc<dyn Encoder>,
        mut broker: B,
        notifications: mpsc::Receiver<Notification>,
    ) -> Producer<B> {
        let token = CancellationToken::new();
        let mut workers = JoinSet::new();

        let successes = broker.take_successes();
        let errors = broker.take_errors();
        let broker_input = broker.input();

        workers.spawn(run_loop(
            encoder.clone(),
            notifications,
            broker_input,
            token.clone(),
        ));
        workers.spawn(success_loop(encoder.clone(), successes));
        workers.spawn(error_loop(encoder, errors));

        Producer {
            broker,
            token,
            workers,
        }
    }

    /// Orderly shutdown: signals the workers, closes the broker client
    /// (which closes its success and error streams), then waits for
    /// every worker to exit. After `stop` returns no further broker
    /// input writes occur. Consuming `self` makes a second stop, or a
    /// write through a retained producer, unrepresentable.
    pub async fn stop(mut self) {
        self.token.cancel();
        self.broker.close().await;
        while let Some(result) = self.workers.join_next().await {
            if let Err(err) = result {
                if err.is_panic() {
                    std::panic::resume_unwind(err.into_panic());
                }
            }
        }
    }
}

async fn run_loop(
    encoder: Arc<dyn Encoder>,
    mut notifications: mpsc::Receiver<Notification>,
    broker_input: mpsc::Sender<EncodedMessage>,
    token: CancellationToken,
) {
    loop {
        let notification = tokio::select! {
            _ = token.cancelled() => return,
            notification = notifications.recv() => match notification {
                Some(notification) => notification,
                // Every writer is gone.
                None => return,
            },
        };
        let message = match encoder.encode(&notification) {
            Ok(message) => message,
            Err(EncodeError::UnhandledNotification) => continue,
            Err(err) => {
                panic!("invariant violated: encoder rejected a notification: {err}")
            }
        };
        tokio::select! {
            _ = token.cancelled() => return,
            sent = broker_input.send(message) => {
                if sent.is_err() {
                    warn!("broker input closed; pipeline exiting");
                    return;
                }
            }
        }
    }
}

async fn success_loop(encoder: Arc<dyn Encoder>, mut successes: mpsc::Receiver<EncodedMessage>) {
    while let Some(message) = successes.recv().await {
        encoder.handle_success(message);
    }
    debug!("success stream closed");
}

async fn error_loop(encoder: Arc<dyn Encoder>, mut errors: mpsc::Receiver<DeliveryFailure>) {
    while let Some(failure) = errors.recv().await {
        encoder.handle_error(failure);
    }
    debug!("error stream closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::MessageMetadata;
    use bytes::Bytes;
    use rill_path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime};

    fn notification(stamp: i64) -> Notification {
        Notification {
            timestamp_ns: stamp,
            prefix: Path::root(),
            updates: vec![],
            deletes: vec![],
        }
    }

    /// Encoder that stamps the notification's timestamp into the key and
    /// counts hook invocations.
    #[derive(Default)]
    struct TestEncoder {
        unhandled_odd: bool,
        poison: Option<i64>,
        poison_seen: AtomicBool,
        successes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl Encoder for TestEncoder {
        fn encode(&self, notification: &Notification) -> Result<EncodedMessage, EncodeError> {
            if self.poison == Some(notification.timestamp_ns) {
                self.poison_seen.store(true, Ordering::SeqCst);
                return Err(EncodeError::Invalid("unrepresentable".into()));
            }
            if self.unhandled_odd && notification.timestamp_ns % 2 != 0 {
                return Err(EncodeError::UnhandledNotification);
            }
            Ok(EncodedMessage {
                topic: "telemetry".into(),
                key: Bytes::from(notification.timestamp_ns.to_string().into_bytes()),
                payload: Bytes::new(),
                metadata: MessageMetadata {
                    start_time: SystemTime::now(),
                    num_messages: 1,
                },
            })
        }

        fn handle_success(&self, _message: EncodedMessage) {
            self.successes.fetch_add(1, Ordering::SeqCst);
        }

        fn handle_error(&self, _failure: DeliveryFailure) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// In-memory broker: records everything it receives in order and
    /// acknowledges each message on the success stream, or on the error
    /// stream for the configured failing topic.
    struct MockBroker {
        input: mpsc::Sender<EncodedMessage>,
        successes: Option<mpsc::Receiver<EncodedMessage>>,
        errors: Option<mpsc::Receiver<DeliveryFailure>>,
        received: Arc<Mutex<Vec<EncodedMessage>>>,
        shutdown: CancellationToken,
        driver: Option<tokio::task::JoinHandle<()>>,
    }

    impl MockBroker {
        fn new() -> MockBroker {
            MockBroker::failing_topic(None)
        }

        fn failing_topic(fail_topic: Option<&str>) -> MockBroker {
            let (input, mut input_rx) = mpsc::channel::<EncodedMessage>(16);
            let (success_tx, success_rx) = mpsc::channel(16);
            let (error_tx, error_rx) = mpsc::channel(16);
            let received: Arc<Mutex<Vec<EncodedMessage>>> = Arc::default();
            let shutdown = CancellationToken::new();
            let fail_topic = fail_topic.map(str::to_string);

            let driver = tokio::spawn({
                let received = received.clone();
                let shutdown = shutdown.clone();
                async move {
                    loop {
                        let message = tokio::select! {
                            _ = shutdown.cancelled() => break,
                            message = input_rx.recv() => match message {
                                Some(message) => message,
                                None => break,
                            },
                        };
                        received.lock().expect("mock lock").push(message.clone());
                        if fail_topic.as_deref() == Some(message.topic.as_str()) {
                            let _ = error_tx
                                .send(DeliveryFailure {
                                    message,
                                    detail: "partition offline".into(),
                                })
                                .await;
                        } else {
                            let _ = success_tx.send(message).await;
                        }
                    }
                }
            });

            MockBroker {
                input,
                successes: Some(success_rx),
                errors: Some(error_rx),
                received,
                shutdown,
                driver: Some(driver),
            }
        }

        fn received(&self) -> Arc<Mutex<Vec<EncodedMessage>>> {
            self.received.clone()
        }
    }

    impl BrokerClient for MockBroker {
        fn input(&self) -> mpsc::Sender<EncodedMessage> {
            self.input.clone()
        }

        fn take_successes(&mut self) -> mpsc::Receiver<EncodedMessage> {
            self.successes
                .take()
                .expect("invariant violated: success stream already taken")
        }

        fn take_errors(&mut self) -> mpsc::Receiver<DeliveryFailure> {
            self.errors
                .take()
                .expect("invariant violated: error stream already taken")
        }

        async fn close(&mut self) {
            self.shutdown.cancel();
            if let Some(driver) = self.driver.take() {
                let _ = driver.await;
            }
        }
    }

    async fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) {
        tokio::time::timeout(deadline, async {
            while !done() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("condition should hold before the deadline");
    }

    #[tokio::test]
    async fn racing_writer_and_stop_leave_a_fifo_prefix() {
        let broker = MockBroker::new();
        let received = broker.received();
        let (producer, writer) = Producer::start(Arc::new(TestEncoder::default()), broker);

        let writer_task = tokio::spawn(async move {
            for i in 0..1000 {
                if writer.write(notification(i)).await.is_err() {
                    break;
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        producer.stop().await;

        let received = received.lock().expect("mock lock");
        for (i, message) in received.iter().enumerate() {
            assert_eq!(
                message.key,
                Bytes::from(i.to_string().into_bytes()),
                "broker input must be a FIFO prefix of the writes",
            );
        }
        drop(received);
        writer_task.await.expect("writer task should finish");
    }

    #[tokio::test]
    async fn write_after_stop_reports_stopped() {
        let broker = MockBroker::new();
        let (producer, writer) = Producer::start(Arc::new(TestEncoder::default()), broker);
        writer
            .write(notification(1))
            .await
            .expect("pipeline is running");
        producer.stop().await;
        assert_eq!(
            writer.write(notification(2)).await,
            Err(WriteError::Stopped)
        );
    }

    #[tokio::test]
    async fn unhandled_notifications_are_dropped_silently() {
        let broker = MockBroker::new();
        let received = broker.received();
        let encoder = Arc::new(TestEncoder {
            unhandled_odd: true,
            ..TestEncoder::default()
        });
        let (producer, writer) = Producer::start(encoder, broker);
        for i in 0..10 {
            writer.write(notification(i)).await.expect("running");
        }
        wait_until(Duration::from_secs(1), || {
            received.lock().expect("mock lock").len() == 5
        })
        .await;
        producer.stop().await;
        let received = received.lock().expect("mock lock");
        let keys: Vec<_> = received.iter().map(|m| m.key.clone()).collect();
        assert_eq!(
            keys,
            ["0", "2", "4", "6", "8"]
                .map(|k| Bytes::from(k.as_bytes()))
                .to_vec()
        );
    }

    #[tokio::test]
    async fn success_stream_feeds_the_encoder_hook() {
        let broker = MockBroker::new();
        let encoder = Arc::new(TestEncoder::default());
        let hooks = encoder.clone();
        let (producer, writer) = Producer::start(encoder, broker);
        for i in 0..5 {
            writer.write(notification(i)).await.expect("running");
        }
        wait_until(Duration::from_secs(1), || {
            hooks.successes.load(Ordering::SeqCst) == 5
        })
        .await;
        producer.stop().await;
        assert_eq!(hooks.errors.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn error_stream_feeds_the_encoder_hook() {
        let broker = MockBroker::failing_topic(Some("telemetry"));
        let encoder = Arc::new(TestEncoder::default());
        let hooks = encoder.clone();
        let (producer, writer) = Producer::start(encoder, broker);
        for i in 0..3 {
            writer.write(notification(i)).await.expect("running");
        }
        wait_until(Duration::from_secs(1), || {
            hooks.errors.load(Ordering::SeqCst) == 3
        })
        .await;
        producer.stop().await;
        assert_eq!(hooks.successes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    #[should_panic(expected = "invariant violated: encoder rejected a notification")]
    async fn fatal_encode_errors_abort_on_stop() {
        let broker = MockBroker::new();
        let encoder = Arc::new(TestEncoder {
            poison: Some(13),
            ..TestEncoder::default()
        });
        let poisoned = encoder.clone();
        let (producer, writer) = Producer::start(encoder, broker);
        writer.write(notification(13)).await.expect("running");
        wait_until(Duration::from_secs(1), || {
            poisoned.poison_seen.load(Ordering::SeqCst)
        })
        .await;
        producer.stop().await;
    }

    #[tokio::test]
    async fn caller_shared_channel_closes_the_pipeline_input() {
        let broker = MockBroker::new();
        let received = broker.received();
        let (tx, rx) = mpsc::channel(8);
        let producer =
            Producer::start_with_channel(Arc::new(TestEncoder::default()), broker, rx);
        tx.send(notification(0)).await.expect("open channel");
        tx.send(notification(1)).await.expect("open channel");
        drop(tx);
        wait_until(Duration::from_secs(1), || {
            received.lock().expect("mock lock").len() == 2
        })
        .await;
        producer.stop().await;
    }
}
