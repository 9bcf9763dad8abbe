//! `teleop-middleware` – the link plumbing.
//!
//! Moves bytes between the operator client and the remote controller and
//! between the client and its presentation layer, without deciding what any
//! of it means.
//!
//! # Modules
//!
//! - [`bus`] – topic-routed publish/subscribe bus built on Tokio broadcast
//!   channels; renderers and the operator console subscribe here.
//! - [`codec`] – the JSON wire envelope: validating inbound parse into typed
//!   telemetry and outbound command encoding.
//! - [`transport`] – the [`Transport`] trait the session drives.
//! - [`ws_transport`] – [`WsTransport`], the WebSocket implementation.
//! - [`loopback`] – in-memory transport pair for driving a client without a
//!   network.
//! - [`status_poll`] – one-shot `GET /api/status` fallback.

pub mod bus;
pub mod codec;
pub mod loopback;
pub mod status_poll;
pub mod transport;
pub mod ws_transport;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use codec::{InboundEvent, Outbound, decode_inbound, encode_outbound};
pub use loopback::{LoopbackConnection, LoopbackRemote, LoopbackTransport};
pub use status_poll::StatusPoller;
pub use transport::{LinkFrame, Transport};
pub use ws_transport::{DEFAULT_IO_TIMEOUT, WsTransport};
