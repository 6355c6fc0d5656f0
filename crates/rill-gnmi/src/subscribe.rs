//! Reconnecting telemetry subscriber.
//!
//! [`Subscriber::run`] dials the server, sends one subscription list, and
//! forwards each inbound notification to the caller's channel as a typed
//! [`Notification`]. A clean end of stream returns; any other transport
//! failure tears the session down, sleeps the configured backoff, and
//! redials. Cancellation is observed at every suspension point.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::OpenConfigClient;
use crate::notification::Notification;
use crate::proto;

#[derive(Debug, Clone)]
pub struct SubscribeOptions {
    /// `host:port` of the telemetry server.
    pub address: String,
    /// Optional credentials, sent as `username`/`password` metadata pairs
    /// on the subscribe call.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Subscription paths in `/`-separated form.
    pub paths: Vec<String>,
    /// Sleep between reconnect attempts.
    pub backoff: Duration,
    /// Bound on a single dial attempt.
    pub dial_timeout: Duration,
}

impl SubscribeOptions {
    pub fn new(address: impl Into<String>) -> SubscribeOptions {
        SubscribeOptions {
            address: address.into(),
            username: None,
            password: None,
            paths: Vec::new(),
            backoff: Duration::from_secs(1),
            dial_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
pub enum SubscribeError {
    /// Dial failed before a stream existed.
    Dial(String),
    /// The stream itself failed.
    Stream(tonic::Status),
    /// Credentials cannot be encoded as gRPC metadata. Fatal: retrying
    /// cannot help.
    Credentials(String),
}

impl std::fmt::Display for SubscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dial(detail) => write!(f, "dial: {detail}"),
            Self::Stream(status) => write!(f, "stream: {status}"),
            Self::Credentials(detail) => write!(f, "credentials: {detail}"),
        }
    }
}

impl std::error::Error for SubscribeError {}

impl From<tonic::Status> for SubscribeError {
    fn from(status: tonic::Status) -> SubscribeError {
        SubscribeError::Stream(status)
    }
}

/// One live subscribe session.
pub trait ResponseStream: Send {
    /// The next server message; `Ok(None)` is a clean end of stream.
    fn next_response(
        &mut self,
    ) -> impl Future<Output = Result<Option<proto::SubscribeResponse>, SubscribeError>> + Send;
}

/// Dials subscribe sessions. The production implementation is
/// [`GrpcTransport`]; tests inject scripted streams here.
pub trait SubscribeTransport: Send {
    type Stream: ResponseStream;

    fn dial(
        &mut self,
        options: &SubscribeOptions,
    ) -> impl Future<Output = Result<Self::Stream, SubscribeError>> + Send;
}

/// Production transport over the tonic client.
#[derive(Debug, Default)]
pub struct GrpcTransport;

pub struct GrpcStream {
    inner: tonic::codec::Streaming<proto::SubscribeResponse>,
    // The request stream stays open for the lifetime of the session; the
    // server sees end-of-requests when this sender drops.
    _requests: mpsc::Sender<proto::SubscribeRequest>,
}

impl ResponseStream for GrpcStream {
    async fn next_response(&mut self) -> Result<Option<proto::SubscribeResponse>, SubscribeError> {
        self.inner.message().await.map_err(SubscribeError::from)
    }
}

impl SubscribeTransport for GrpcTransport {
    type Stream = GrpcStream;

    async fn dial(&mut self, options: &SubscribeOptions) -> Result<GrpcStream, SubscribeError> {
        let connect = OpenConfigClient::connect(format!("http://{}", options.address));
        let mut client = tokio::time::timeout(options.dial_timeout, connect)
            .await
            .map_err(|_| SubscribeError::Dial(format!("timed out after {:?}", options.dial_timeout)))?
            .map_err(|err| SubscribeError::Dial(err.to_string()))?;

        let (requests, rx) = mpsc::channel(1);
        let list = proto::SubscriptionList {
            subscription: options
                .paths
                .iter()
                .map(|p| proto::Subscription {
                    path: Some(proto::Path::from_slash_string(p)),
                })
                .collect(),
        };
        requests
            .send(proto::SubscribeRequest {
                request: Some(proto::subscribe_request::Request::Subscribe(list)),
            })
            .await
            .map_err(|_| SubscribeError::Dial("request stream closed before use".into()))?;

        let mut request = tonic::Request::new(ReceiverStream::new(rx));
        if let (Some(username), Some(password)) = (&options.username, &options.password) {
            let username = username
                .parse()
                .map_err(|_| SubscribeError::Credentials("username is not valid metadata".into()))?;
            let password = password
                .parse()
                .map_err(|_| SubscribeError::Credentials("password is not valid metadata".into()))?;
            let metadata = request.metadata_mut();
            metadata.insert("username", username);
            metadata.insert("password", password);
        }

        let response = client.subscribe(request).await?;
        Ok(GrpcStream {
            inner: response.into_inner(),
            _requests: requests,
        })
    }
}

enum SessionEnd {
    Eof,
    Stopped,
    Failed(SubscribeError),
}

pub struct Subscriber<T = GrpcTransport> {
    options: SubscribeOptions,
    transport: T,
    token: CancellationToken,
}

impl Subscriber<GrpcTransport> {
    pub fn new(options: SubscribeOptions) -> Subscriber<GrpcTransport> {
        Subscriber::with_transport(options, GrpcTransport)
    }
}

impl<T: SubscribeTransport> Subscriber<T> {
    pub fn with_transport(options: SubscribeOptions, transport: T) -> Subscriber<T> {
        Subscriber {
            options,
            transport,
            token: CancellationToken::new(),
        }
    }

    /// Token observed at every suspension point; cancel it to stop
    /// [`Subscriber::run`] cleanly.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Runs until the stream ends cleanly, the token is cancelled, the
    /// publish channel closes, or a fatal (non-retryable) error occurs.
    /// Transient dial and stream failures reconnect after the configured
    /// backoff.
    pub async fn run(
        mut self,
        publish: mpsc::Sender<Notification>,
    ) -> Result<(), SubscribeError> {
        loop {
            let dialed = tokio::select! {
                _ = self.token.cancelled() => return Ok(()),
                dialed = self.transport.dial(&self.options) => dialed,
            };
            let stream = match dialed {
                Ok(stream) => stream,
                Err(err @ SubscribeError::Credentials(_)) => return Err(err),
                Err(err) => {
                    warn!(address = %self.options.address, %err, "dial failed");
                    if !self.sleep_backoff().await {
                        return Ok(());
                    }
                    continue;
                }
            };
            debug!(address = %self.options.address, "subscribed");

            match self.pump(stream, &publish).await {
                SessionEnd::Eof => {
                    debug!(address = %self.options.address, "stream ended");
                    return Ok(());
                }
                SessionEnd::Stopped => return Ok(()),
                SessionEnd::Failed(err) => {
                    warn!(address = %self.options.address, %err, "stream failed");
                    if !self.sleep_backoff().await {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn pump(&self, mut stream: T::Stream, publish: &mpsc::Sender<Notification>) -> SessionEnd {
        loop {
            let response = tokio::select! {
                _ = self.token.cancelled() => return SessionEnd::Stopped,
                response = stream.next_response() => match response {
                    Ok(Some(response)) => response,
                    Ok(None) => return SessionEnd::Eof,
                    Err(err) => return SessionEnd::Failed(err),
                },
            };
            let Some(response) = response.response else {
                debug!("empty subscribe response");
                continue;
            };
            match response {
                proto::subscribe_response::Response::Update(wire) => {
                    let notification = match Notification::try_from(wire) {
                        Ok(notification) => notification,
                        Err(err) => {
                            warn!(%err, "dropping malformed notification");
                            continue;
                        }
                    };
                    let sent = tokio::select! {
                        _ = self.token.cancelled() => return SessionEnd::Stopped,
                        sent = publish.send(notification) => sent,
                    };
                    if sent.is_err() {
                        // Receiver dropped: nobody is listening anymore.
                        return SessionEnd::Stopped;
                    }
                }
                proto::subscribe_response::Response::Heartbeat(hb) => {
                    debug!(interval = hb.interval, "heartbeat");
                }
                proto::subscribe_response::Response::SyncResponse(done) => {
                    debug!(done, "sync response");
                }
            }
        }
    }

    /// Returns `false` if cancelled while sleeping.
    async fn sleep_backoff(&self) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(self.options.backoff) => true,
        }
    }
}
