//! SSE wire messages and the response transport the relay writes into.

use crate::api::disconnect::DisconnectStream;
use crate::core::error::AppError;
use crate::core::StreamCancelHandle;
use crate::services::token_source::Token;
use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// One message on the SSE wire, framed as `data: <json>\n\n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireMessage {
    Token { content: String, finished: bool },
    Done,
    Error { message: String },
}

impl WireMessage {
    pub fn token(token: &Token) -> Self {
        WireMessage::Token {
            content: token.content.clone(),
            finished: token.finished,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        WireMessage::Error {
            message: message.into(),
        }
    }

    /// `Done` and `Error` end a session.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WireMessage::Token { .. })
    }

    /// Encode as a single SSE frame.
    pub fn to_frame(&self) -> Result<Bytes, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(Bytes::from(format!("data: {}\n\n", json)))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The receiving side is gone; nothing more can be delivered.
    #[error("transport closed")]
    Closed,

    #[error("transport write failed: {0}")]
    Write(String),
}

/// Output side of a streaming session.
///
/// Writes are non-blocking and ordered. After [`close`](Self::close) every
/// write fails with [`TransportError::Closed`].
pub trait SseTransport: Send {
    fn write_frame(&mut self, message: &WireMessage) -> Result<(), TransportError>;

    /// Finish the response. Idempotent.
    fn close(&mut self);

    fn is_closed(&self) -> bool;

    /// Flips to `true` when the client disconnects.
    fn disconnect_signal(&self) -> watch::Receiver<bool>;

    fn bytes_written(&self) -> usize;
}

/// Transport feeding an axum response body through an unbounded channel.
pub struct ChannelTransport {
    sender: Option<mpsc::UnboundedSender<Bytes>>,
    cancel_handle: StreamCancelHandle,
    bytes_written: usize,
}

impl SseTransport for ChannelTransport {
    fn write_frame(&mut self, message: &WireMessage) -> Result<(), TransportError> {
        let Some(sender) = self.sender.as_ref() else {
            return Err(TransportError::Closed);
        };
        let frame = message
            .to_frame()
            .map_err(|e| TransportError::Write(e.to_string()))?;
        let len = frame.len();
        sender.send(frame).map_err(|_| TransportError::Closed)?;
        self.bytes_written += len;
        Ok(())
    }

    fn close(&mut self) {
        if self.sender.take().is_some() {
            self.cancel_handle.mark_completed();
        }
    }

    fn is_closed(&self) -> bool {
        self.sender.as_ref().map_or(true, |s| s.is_closed())
    }

    fn disconnect_signal(&self) -> watch::Receiver<bool> {
        self.cancel_handle.subscribe()
    }

    fn bytes_written(&self) -> usize {
        self.bytes_written
    }
}

/// Create a connected transport and response body.
///
/// Dropping the body before the transport is closed counts as a client
/// disconnect.
pub fn sse_channel(cancel_handle: StreamCancelHandle) -> (ChannelTransport, Body) {
    let (sender, receiver) = mpsc::unbounded_channel::<Bytes>();

    let frames = stream::unfold(receiver, |mut rx| async move {
        rx.recv().await.map(|frame| (Ok::<_, Infallible>(frame), rx))
    })
    .boxed();
    let body = Body::from_stream(DisconnectStream::new(frames, cancel_handle.clone()));

    let transport = ChannelTransport {
        sender: Some(sender),
        cancel_handle,
        bytes_written: 0,
    };
    (transport, body)
}

/// Put a response into streaming mode: status 200 plus non-buffering headers.
pub fn sse_response(body: Body) -> Result<Response, AppError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no")
        .body(body)
        .map_err(|e| AppError::StreamSetup(e.to_string()))
}
