//! [`WsTransport`] – WebSocket link to the remote controller.
//!
//! Text frames carry the JSON envelope handled by [`crate::codec`].
//! Protocol-level pings are answered by `tungstenite` itself and surface as
//! [`LinkFrame::Activity`] so the keepalive watchdog sees them.
//!
//! Writes and the close handshake are bounded by an I/O timeout. A peer
//! that stops reading must not park the caller: on expiry the socket is
//! dropped and the link reports [`TeleopError::Timeout`].

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use teleop_types::TeleopError;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::transport::{LinkFrame, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default bound on a single write or close handshake.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket client transport.
pub struct WsTransport {
    url: String,
    io_timeout: Duration,
    stream: Option<WsStream>,
}

impl WsTransport {
    /// Create a transport for `url` (e.g. `"ws://rover.local:5000/ws"`).
    /// Nothing is dialled until [`Transport::open`].
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            io_timeout: DEFAULT_IO_TIMEOUT,
            stream: None,
        }
    }

    /// Bound writes and the close handshake by `timeout`.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&mut self) -> Result<(), TeleopError> {
        self.close().await;

        let (stream, response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TeleopError::Connect(format!("{}: {e}", self.url)))?;
        info!(url = %self.url, status = %response.status(), "websocket link established");
        self.stream = Some(stream);
        Ok(())
    }

    async fn send_text(&mut self, text: String) -> Result<(), TeleopError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TeleopError::Transport("websocket is not open".to_string()))?;
        let sent = tokio::time::timeout(self.io_timeout, stream.send(Message::Text(text.into())));
        match sent.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.stream = None;
                Err(TeleopError::Transport(format!("websocket send: {e}")))
            }
            Err(_) => {
                warn!(timeout = ?self.io_timeout, "websocket send stalled; dropping link");
                self.stream = None;
                Err(TeleopError::Timeout(self.io_timeout.as_millis() as u64))
            }
        }
    }

    async fn next_frame(&mut self) -> Option<Result<LinkFrame, TeleopError>> {
        let stream = self.stream.as_mut()?;
        let outcome = match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                return Some(Ok(LinkFrame::Text(text.as_str().to_owned())));
            }
            Some(Ok(Message::Binary(bytes))) => {
                debug!(len = bytes.len(), "ignoring binary websocket frame");
                return Some(Ok(LinkFrame::Activity));
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                return Some(Ok(LinkFrame::Activity));
            }
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "peer closed websocket");
                None
            }
            Some(Err(e)) => {
                warn!(error = %e, "websocket read failed");
                Some(Err(TeleopError::Transport(format!("websocket read: {e}"))))
            }
            None => None,
        };
        self.stream = None;
        outcome
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            match tokio::time::timeout(self.io_timeout, stream.close(None)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "websocket close handshake failed"),
                Err(_) => debug!(timeout = ?self.io_timeout, "websocket close handshake timed out"),
            }
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transport_is_closed() {
        let transport = WsTransport::new("ws://localhost:5000/ws");
        assert_eq!(transport.url(), "ws://localhost:5000/ws");
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn open_against_nothing_fails_with_connect_error() {
        // Port 9 (discard) is not expected to run a websocket server.
        let mut transport = WsTransport::new("ws://127.0.0.1:9/ws");
        let err = transport.open().await.unwrap_err();
        assert!(matches!(err, TeleopError::Connect(_)));
        assert!(!transport.is_open());
    }
}
