//! The link abstraction the session drives.
//!
//! The session layer never speaks WebSocket directly. It opens, writes to,
//! reads from and closes a [`Transport`]; [`WsTransport`] talks to a real
//! vehicle and [`LoopbackTransport`] keeps everything in memory.
//!
//! # Contract
//!
//! * At most one underlying connection exists at a time: `open` on an open
//!   transport replaces the previous connection.
//! * `next_frame` is cancel-safe; the client polls it inside `select!`.
//! * `next_frame` returning `None` means the peer closed the link.
//!
//! [`WsTransport`]: crate::ws_transport::WsTransport
//! [`LoopbackTransport`]: crate::loopback::LoopbackTransport

use async_trait::async_trait;
use teleop_types::TeleopError;

/// One unit of inbound traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkFrame {
    /// An application text frame carrying a wire envelope.
    Text(String),
    /// Link-level traffic with no application payload (protocol pings,
    /// binary noise). Still proves the peer is alive.
    Activity,
}

#[async_trait]
pub trait Transport: Send {
    /// Establish the connection.
    async fn open(&mut self) -> Result<(), TeleopError>;

    /// Write one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TeleopError>;

    /// Wait for the next inbound frame; `None` once the link is closed.
    async fn next_frame(&mut self) -> Option<Result<LinkFrame, TeleopError>>;

    /// Tear the connection down. Idempotent.
    async fn close(&mut self);

    /// `true` while a connection is held.
    fn is_open(&self) -> bool;
}
