//! In-memory [`Transport`] pair.
//!
//! [`LoopbackTransport`] is handed to the client; the matching
//! [`LoopbackRemote`] plays the vehicle. Every successful `open` yields a
//! fresh [`LoopbackConnection`] on the remote side, so tests can observe
//! reconnects, refuse connections, and drop links at will.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use teleop_types::TeleopError;
use tokio::sync::mpsc;

use crate::transport::{LinkFrame, Transport};

/// Client half of the loopback pair.
pub struct LoopbackTransport {
    accepting: Arc<AtomicBool>,
    open_attempts: Arc<AtomicUsize>,
    connections: mpsc::UnboundedSender<LoopbackConnection>,
    inbound: Option<mpsc::UnboundedReceiver<String>>,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

/// Vehicle half of the loopback pair.
pub struct LoopbackRemote {
    accepting: Arc<AtomicBool>,
    open_attempts: Arc<AtomicUsize>,
    connections: mpsc::UnboundedReceiver<LoopbackConnection>,
}

/// One established loopback link, seen from the vehicle side.
///
/// Dropping it closes the link for the client.
pub struct LoopbackConnection {
    to_client: mpsc::UnboundedSender<String>,
    from_client: mpsc::UnboundedReceiver<String>,
}

/// Create a connected transport/remote pair. The remote accepts
/// connections until told otherwise.
pub fn pair() -> (LoopbackTransport, LoopbackRemote) {
    let accepting = Arc::new(AtomicBool::new(true));
    let open_attempts = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::unbounded_channel();
    (
        LoopbackTransport {
            accepting: Arc::clone(&accepting),
            open_attempts: Arc::clone(&open_attempts),
            connections: tx,
            inbound: None,
            outbound: None,
        },
        LoopbackRemote {
            accepting,
            open_attempts,
            connections: rx,
        },
    )
}

impl LoopbackTransport {
    /// See [`pair`].
    pub fn pair() -> (LoopbackTransport, LoopbackRemote) {
        pair()
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn open(&mut self) -> Result<(), TeleopError> {
        self.close().await;
        self.open_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(TeleopError::Connect("loopback remote refused the connection".to_string()));
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        self.connections
            .send(LoopbackConnection {
                to_client,
                from_client,
            })
            .map_err(|_| TeleopError::Connect("loopback remote is gone".to_string()))?;
        self.inbound = Some(inbound);
        self.outbound = Some(outbound);
        Ok(())
    }

    async fn send_text(&mut self, text: String) -> Result<(), TeleopError> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| TeleopError::Transport("loopback link is not open".to_string()))?;
        outbound
            .send(text)
            .map_err(|_| TeleopError::Transport("loopback peer hung up".to_string()))
    }

    async fn next_frame(&mut self) -> Option<Result<LinkFrame, TeleopError>> {
        let inbound = self.inbound.as_mut()?;
        match inbound.recv().await {
            Some(text) => Some(Ok(LinkFrame::Text(text))),
            None => {
                self.inbound = None;
                self.outbound = None;
                None
            }
        }
    }

    async fn close(&mut self) {
        self.inbound = None;
        self.outbound = None;
    }

    fn is_open(&self) -> bool {
        self.outbound.is_some()
    }
}

impl LoopbackRemote {
    /// Allow or refuse subsequent `open` calls.
    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }

    /// Total number of `open` calls, successful or not.
    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }

    /// Wait for the client's next successful `open`.
    pub async fn accept(&mut self) -> Option<LoopbackConnection> {
        self.connections.recv().await
    }
}

impl LoopbackConnection {
    /// Push a text frame to the client. Returns `false` once the client
    /// has dropped the link.
    pub fn push(&self, text: impl Into<String>) -> bool {
        self.to_client.send(text.into()).is_ok()
    }

    /// Wait for the next frame the client wrote; `None` once it closed.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Drain whatever the client has written so far without waiting.
    pub fn drain_sent(&mut self) -> Vec<String> {
        let mut sent = Vec::new();
        while let Ok(text) = self.from_client.try_recv() {
            sent.push(text);
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (mut transport, mut remote) = pair();
        transport.open().await.unwrap();
        let mut conn = remote.accept().await.expect("connection");

        assert!(conn.push(r#"{"event":"ping"}"#));
        let frame = transport.next_frame().await.unwrap().unwrap();
        assert_eq!(frame, LinkFrame::Text(r#"{"event":"ping"}"#.to_string()));

        transport.send_text(r#"{"event":"pong"}"#.to_string()).await.unwrap();
        assert_eq!(conn.next_sent().await.as_deref(), Some(r#"{"event":"pong"}"#));
    }

    #[tokio::test]
    async fn dropping_the_connection_closes_the_link() {
        let (mut transport, mut remote) = pair();
        transport.open().await.unwrap();
        let conn = remote.accept().await.expect("connection");
        drop(conn);

        assert!(transport.next_frame().await.is_none());
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn refused_open_is_counted() {
        let (mut transport, remote) = pair();
        remote.set_accepting(false);

        let err = transport.open().await.unwrap_err();
        assert!(matches!(err, TeleopError::Connect(_)));
        assert_eq!(remote.open_attempts(), 1);
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn send_on_closed_link_fails() {
        let (mut transport, _remote) = pair();
        let err = transport.send_text("x".to_string()).await.unwrap_err();
        assert!(matches!(err, TeleopError::Transport(_)));
    }
}
