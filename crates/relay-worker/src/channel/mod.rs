//! Control channel to the parent process.
//!
//! # Architecture
//!
//! - **codec**: length-prefixed JSON framing for AsyncRead/AsyncWrite
//! - **protocol**: request/response documents and the closed method set
//! - **fd**: adopting the inherited socket descriptor
//!
//! [`Channel`] owns both halves of the socket. Inbound frames become
//! [`Request`]s; answering a request queues a [`Response`] that the channel
//! writes out the next time it is polled (or when it is closed). Responses
//! are correlated by id, so they may go out in any order.
//!
//! A response is encoded into the write buffer the moment the channel takes
//! it off the queue, and flushed separately. Dropping a pending
//! [`Channel::next_event`] therefore never loses a response. A response too
//! large to frame is replaced by a rejection with [`RESPONSE_TOO_LARGE`].

pub mod codec;
pub mod fd;
pub mod protocol;

use std::collections::HashSet;
use std::io;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Encoder, FramedRead, FramedWrite};

use crate::error::ProtocolViolation;

use codec::JsonCodec;
use protocol::{MethodId, RequestMessage, Response, Target};

/// Rejection code sent in place of a response that exceeds the frame limit.
pub const RESPONSE_TOO_LARGE: u16 = 500;

/// How long [`Channel::close`] waits for the parent to take queued responses.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// A request waiting for its single answer.
///
/// [`accept`](Self::accept) and [`reject`](Self::reject) consume the request,
/// so answering twice does not compile. Dropping a request unanswered is
/// logged.
#[derive(Debug)]
pub struct Request {
    pub id: u32,
    pub method: MethodId,
    pub target: Target,
    pub data: Option<serde_json::Value>,
    replied: bool,
    response_tx: mpsc::UnboundedSender<Response>,
}

impl Request {
    pub fn accept(mut self, data: Option<serde_json::Value>) {
        tracing::trace!(id = self.id, method = %self.method, "Request accepted");
        let response = Response::accepted(self.id, data);
        self.reply(response);
    }

    pub fn reject(mut self, code: u16, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::debug!(id = self.id, method = %self.method, code, %reason, "Request rejected");
        let response = Response::rejected(self.id, code, reason);
        self.reply(response);
    }

    fn reply(&mut self, response: Response) {
        self.replied = true;
        if self.response_tx.send(response).is_err() {
            tracing::warn!(id = self.id, "Channel gone, response dropped");
        }
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        if !self.replied {
            tracing::warn!(id = self.id, method = %self.method, "Request dropped without a response");
        }
    }
}

#[derive(Debug)]
pub enum ChannelEvent {
    Request(Request),
    /// The parent closed its end. Reported once.
    RemotelyClosed,
}

enum Next {
    Queue(Response),
    Flushed(io::Result<()>),
    Frame(Option<io::Result<RequestMessage>>),
}

pub struct Channel {
    reader: FramedRead<OwnedReadHalf, JsonCodec<RequestMessage>>,
    writer: FramedWrite<OwnedWriteHalf, JsonCodec<Response>>,
    response_tx: mpsc::UnboundedSender<Response>,
    response_rx: mpsc::UnboundedReceiver<Response>,
    in_flight: HashSet<u32>,
    close_timeout: Duration,
    write_failed: bool,
    remotely_closed: bool,
    closed: bool,
}

impl Channel {
    pub fn new(stream: UnixStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (response_tx, response_rx) = mpsc::unbounded_channel();

        Self {
            reader: FramedRead::new(read_half, JsonCodec::new()),
            writer: FramedWrite::new(write_half, JsonCodec::new()),
            response_tx,
            response_rx,
            in_flight: HashSet::new(),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            write_failed: false,
            remotely_closed: false,
            closed: false,
        }
    }

    /// Requests received but not yet answered on the wire.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn set_close_timeout(&mut self, timeout: Duration) {
        self.close_timeout = timeout;
    }

    /// Wait for the next inbound event, writing out queued responses meanwhile.
    ///
    /// Cancel-safe. Never resolves once the channel is closed or the remote
    /// end is gone.
    pub async fn next_event(&mut self) -> Result<ChannelEvent, ProtocolViolation> {
        if self.closed || self.remotely_closed {
            return std::future::pending().await;
        }

        loop {
            let flush_pending = !self.write_failed && !self.writer.write_buffer().is_empty();
            let next = tokio::select! {
                biased;

                Some(response) = self.response_rx.recv() => Next::Queue(response),
                result = SinkExt::<Response>::flush(&mut self.writer), if flush_pending => {
                    Next::Flushed(result)
                }
                frame = self.reader.next() => Next::Frame(frame),
            };

            match next {
                Next::Queue(response) => self.queue_response(response)?,
                Next::Flushed(Ok(())) => {}
                Next::Flushed(Err(e)) => self.fail_writes(e),
                Next::Frame(Some(Ok(message))) => {
                    let request = self.admit(message)?;
                    return Ok(ChannelEvent::Request(request));
                }
                Next::Frame(Some(Err(e))) if e.kind() == io::ErrorKind::InvalidData => {
                    return Err(ProtocolViolation::MalformedFrame {
                        reason: e.to_string(),
                    });
                }
                Next::Frame(Some(Err(e))) => {
                    tracing::error!(error = %e, "Channel read error, treating as remote close");
                    self.remotely_closed = true;
                    return Ok(ChannelEvent::RemotelyClosed);
                }
                Next::Frame(None) => {
                    tracing::debug!(in_flight = self.in_flight.len(), "Channel EOF");
                    self.remotely_closed = true;
                    return Ok(ChannelEvent::RemotelyClosed);
                }
            }
        }
    }

    /// Flush queued responses and shut down the write half.
    ///
    /// Gives up after the close timeout if the parent is not reading; whatever
    /// is still buffered then is dropped. Requests still unanswered at this
    /// point never get a response.
    pub async fn close(&mut self) -> Result<(), ProtocolViolation> {
        if self.closed {
            tracing::error!("Channel already closed");
            return Ok(());
        }
        self.closed = true;

        // The parent may have only shut down its write half, so try anyway.
        while let Ok(response) = self.response_rx.try_recv() {
            self.queue_response(response)?;
        }
        if !self.write_failed {
            let shutdown = SinkExt::<Response>::close(&mut self.writer);
            let result = tokio::time::timeout(self.close_timeout, shutdown).await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "Error shutting down channel writer");
                }
                Err(_) => {
                    tracing::warn!(
                        unsent_bytes = self.writer.write_buffer().len(),
                        timeout = ?self.close_timeout,
                        "Parent is not reading, dropping unsent responses"
                    );
                }
            }
        }

        if !self.in_flight.is_empty() {
            tracing::warn!(
                unanswered = self.in_flight.len(),
                "Closing channel with unanswered requests"
            );
        }
        self.response_rx.close();

        tracing::debug!("Channel closed");
        Ok(())
    }

    fn admit(&mut self, message: RequestMessage) -> Result<Request, ProtocolViolation> {
        let method: MethodId = message.method.parse()?;

        if !self.in_flight.insert(message.id) {
            return Err(ProtocolViolation::DuplicateRequestId { id: message.id });
        }

        tracing::trace!(id = message.id, %method, "Request received");

        Ok(Request {
            id: message.id,
            method,
            target: message.target,
            data: message.data,
            replied: false,
            response_tx: self.response_tx.clone(),
        })
    }

    /// Encode `response` into the write buffer. Flushing happens separately.
    fn queue_response(&mut self, response: Response) -> Result<(), ProtocolViolation> {
        let id = response.id;
        if !self.in_flight.remove(&id) {
            return Err(ProtocolViolation::UnexpectedResponse { id });
        }
        if self.write_failed {
            tracing::debug!(id, "Channel not writable, response dropped");
            return Ok(());
        }

        let mut frame = BytesMut::new();
        if let Err(e) = self.writer.encoder_mut().encode(response, &mut frame) {
            tracing::error!(id, error = %e, "Response cannot be framed, rejecting instead");
            let rejection =
                Response::rejected(id, RESPONSE_TOO_LARGE, format!("response too large: {}", e));
            if let Err(e) = self.writer.encoder_mut().encode(rejection, &mut frame) {
                tracing::error!(id, error = %e, "Failed to encode rejection");
                return Ok(());
            }
        }
        self.writer.write_buffer_mut().extend_from_slice(&frame);
        Ok(())
    }

    fn fail_writes(&mut self, e: io::Error) {
        tracing::error!(
            error = %e,
            dropped_bytes = self.writer.write_buffer().len(),
            "Channel write failed, dropping queued responses"
        );
        self.writer.write_buffer_mut().clear();
        self.write_failed = true;
    }
}
