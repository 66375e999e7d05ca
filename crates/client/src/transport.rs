// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for WebSocket communication.
//!
//! Provides a trait-based transport layer that enables:
//! - Real WebSocket connections for production
//! - Mock transports for unit testing
//!
//! `connect` yields a sink/source pair so the I/O loop can write and read
//! concurrently from the same task without sharing a mutable handle.

use std::future::Future;
use std::pin::Pin;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// The connect request could not be built (bad URL or token).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// What the frame source produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived.
    Frame(String),
    /// The peer closed the connection.
    ///
    /// `normal` is true only for an explicit normal closure (code 1000);
    /// a dropped stream without a close frame counts as abnormal.
    Closed { normal: bool },
}

/// Write half of an open connection.
pub trait FrameSink: Send {
    /// Send a text frame.
    fn send(
        &mut self,
        text: String,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Close the connection with a normal closure code.
    fn close(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;
}

/// Read half of an open connection.
pub trait FrameSource: Send {
    /// Wait for the next inbound event.
    fn next(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<TransportEvent>> + Send + '_>>;
}

/// Transport trait for WebSocket-like connections.
///
/// This trait abstracts over the actual transport mechanism, allowing
/// for easy testing with mock implementations.
pub trait Transport: Send + Sync {
    /// Open a connection to `url`, authenticating with the bearer token.
    ///
    /// The token travels out-of-band (an `Authorization` header), never in
    /// a frame body.
    fn connect(
        &self,
        url: &str,
        token: &str,
    ) -> Pin<
        Box<
            dyn Future<Output = TransportResult<(Box<dyn FrameSink>, Box<dyn FrameSource>)>>
                + Send
                + '_,
        >,
    >;
}

/// WebSocket transport implementation using tokio-tungstenite.
#[derive(Debug, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Create a new WebSocket transport.
    pub fn new() -> Self {
        WebSocketTransport
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct WsSink {
    sink: futures_util::stream::SplitSink<WsStream, Message>,
}

struct WsSource {
    stream: futures_util::stream::SplitStream<WsStream>,
}

impl Transport for WebSocketTransport {
    fn connect(
        &self,
        url: &str,
        token: &str,
    ) -> Pin<
        Box<
            dyn Future<Output = TransportResult<(Box<dyn FrameSink>, Box<dyn FrameSource>)>>
                + Send
                + '_,
        >,
    > {
        let url = url.to_string();
        let token = token.to_string();
        Box::pin(async move {
            let mut request = url
                .into_client_request()
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, bearer);

            let (ws_stream, _) = tokio_tungstenite::connect_async(request)
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

            let (sink, stream) = ws_stream.split();
            Ok((
                Box::new(WsSink { sink }) as Box<dyn FrameSink>,
                Box::new(WsSource { stream }) as Box<dyn FrameSource>,
            ))
        })
    }
}

impl FrameSink for WsSink {
    fn send(
        &mut self,
        text: String,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.sink
                .send(Message::Text(text.into()))
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
            // Flush so connection failures are detected at the send site
            self.sink
                .flush()
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            };
            // The peer may already be gone; closing is best-effort
            let _ = self.sink.send(Message::Close(Some(frame))).await;
            let _ = self.sink.flush().await;
            Ok(())
        })
    }
}

impl FrameSource for WsSource {
    fn next(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<TransportEvent>> + Send + '_>> {
        Box::pin(async move {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return Ok(TransportEvent::Frame(text.to_string()));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let normal = frame
                            .as_ref()
                            .map(|f| f.code == CloseCode::Normal)
                            .unwrap_or(false);
                        return Ok(TransportEvent::Closed { normal });
                    }
                    Some(Ok(_)) => {
                        // Ignore binary, ping, and pong frames
                        continue;
                    }
                    Some(Err(e)) => {
                        return Err(TransportError::ReceiveFailed(e.to_string()));
                    }
                    None => {
                        return Ok(TransportEvent::Closed { normal: false });
                    }
                }
            }
        })
    }
}
