//! Reconnecting record reader.

use std::time::Duration;

use bytes::BytesMut;
use prost::Message;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::frame::split_frame;
use crate::proto::LanzRecord;

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub struct LanzOptions {
    /// `host:port` of the device's record stream.
    pub address: String,
    /// Sleep between reconnect attempts.
    pub backoff: Duration,
    /// Bound on a single connect attempt.
    pub connect_timeout: Duration,
}

impl LanzOptions {
    pub fn new(address: impl Into<String>) -> LanzOptions {
        LanzOptions {
            address: address.into(),
            backoff: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

enum SessionEnd {
    Stopped,
    ReceiverGone,
    Disconnected(String),
}

/// Reads length-delimited records from the device, forever.
///
/// [`LanzClient::run`] owns the record channel's send half; the channel
/// closes exactly once, when the run loop exits (cancellation or the
/// receiver going away). Every disconnect in between reconnects after
/// the configured backoff.
pub struct LanzClient {
    options: LanzOptions,
    token: CancellationToken,
}

impl LanzClient {
    pub fn new(options: LanzOptions) -> LanzClient {
        LanzClient {
            options,
            token: CancellationToken::new(),
        }
    }

    /// Cancel to make [`LanzClient::run`] return at its next suspension
    /// point.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn run(self, records: mpsc::Sender<LanzRecord>) {
        loop {
            let stream = tokio::select! {
                _ = self.token.cancelled() => break,
                connected = tokio::time::timeout(
                    self.options.connect_timeout,
                    TcpStream::connect(&self.options.address),
                ) => match connected {
                    Ok(Ok(stream)) => stream,
                    Ok(Err(err)) => {
                        warn!(address = %self.options.address, %err, "connect failed");
                        if !self.sleep_backoff().await {
                            break;
                        }
                        continue;
                    }
                    Err(_) => {
                        warn!(address = %self.options.address, "connect timed out");
                        if !self.sleep_backoff().await {
                            break;
                        }
                        continue;
                    }
                },
            };
            debug!(address = %self.options.address, "connected");

            match self.read_records(stream, &records).await {
                SessionEnd::Stopped | SessionEnd::ReceiverGone => break,
                SessionEnd::Disconnected(reason) => {
                    debug!(address = %self.options.address, reason, "disconnected");
                    if !self.sleep_backoff().await {
                        break;
                    }
                }
            }
        }
        // `records` drops here: the output channel closes exactly once.
    }

    async fn read_records(
        &self,
        mut stream: TcpStream,
        records: &mpsc::Sender<LanzRecord>,
    ) -> SessionEnd {
        let mut buf = BytesMut::with_capacity(READ_CHUNK);
        loop {
            // Drain every complete frame before reading more.
            loop {
                let payload = match split_frame(&mut buf) {
                    Ok(Some(payload)) => payload,
                    Ok(None) => break,
                    Err(err) => return SessionEnd::Disconnected(err.to_string()),
                };
                let record = match LanzRecord::decode(payload) {
                    Ok(record) => record,
                    Err(err) => {
                        return SessionEnd::Disconnected(format!("bad record: {err}"));
                    }
                };
                let sent = tokio::select! {
                    _ = self.token.cancelled() => return SessionEnd::Stopped,
                    sent = records.send(record) => sent,
                };
                if sent.is_err() {
                    return SessionEnd::ReceiverGone;
                }
            }

            let read = tokio::select! {
                _ = self.token.cancelled() => return SessionEnd::Stopped,
                read = stream.read_buf(&mut buf) => read,
            };
            match read {
                Ok(0) => return SessionEnd::Disconnected("eof".into()),
                Ok(_) => {}
                Err(err) => return SessionEnd::Disconnected(err.to_string()),
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
