//! The duplex message stream underneath a session.
//!
//! Sessions talk to a [`Connector`] rather than to `tokio-tungstenite` directly so the
//! transport can be replaced by an in-memory pair in tests.

use async_trait::async_trait;
use futures_util::{Sink, Stream, StreamExt};
use std::{pin::Pin, time::Duration};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::debug;

pub type WsSink = Pin<Box<dyn Sink<WsMessage, Error = WsError> + Send>>;
pub type WsStream = Pin<Box<dyn Stream<Item = Result<WsMessage, WsError>> + Send>>;

pub struct Transport {
    pub sink: WsSink,
    pub stream: WsStream,
}

impl Transport {
    pub fn new(
        sink: impl Sink<WsMessage, Error = WsError> + Send + 'static,
        stream: impl Stream<Item = Result<WsMessage, WsError>> + Send + 'static,
    ) -> Self {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The server answered the upgrade request with an HTTP error.
    #[error("Handshake rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Io(String),
}

impl TransportError {
    /// Whether another attempt could succeed. Server-side (5xx) and timeout (408)
    /// rejections are transient; any other HTTP status is an answer about the session.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Rejected { status, .. } => *status == 408 || *status >= 500,
            Self::Timeout(_) | Self::Io(_) => true,
        }
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Transport, TransportError>;
}

/// Opens a TLS WebSocket with `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    pub connect_timeout: Duration,
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Transport, TransportError> {
        let (ws_stream, response) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| TransportError::Timeout(self.connect_timeout))?
            .map_err(map_handshake_error)?;
        debug!(status = %response.status(), "WebSocket upgrade complete");

        let (sink, stream) = ws_stream.split();
        Ok(Transport::new(sink, stream))
    }
}

fn map_handshake_error(err: WsError) -> TransportError {
    match err {
        WsError::Http(response) => TransportError::Rejected {
            status: response.status().as_u16(),
            body: response
                .body()
                .as_deref()
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default(),
        },
        other => TransportError::Io(other.to_string()),
    }
}
