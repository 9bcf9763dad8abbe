//! `teleop-kernel` – Safety & Session Core
//!
//! The part of the client that decides *when* things may happen. It owns no
//! sockets and spawns no tasks: every type here is a plain state machine fed
//! with events and the current [`Instant`][std::time::Instant], so every
//! rule can be exercised without a network or a runtime.
//!
//! # Modules
//!
//! - [`session`] – [`SessionMachine`][session::SessionMachine]: the link
//!   lifecycle as an explicit transition table (state × event → next state +
//!   side effects). Entering a link-down state always forces the control
//!   channels safe.
//! - [`reconnect`] – [`ReconnectPolicy`][reconnect::ReconnectPolicy]:
//!   bounded attempts with a capped backoff delay.
//! - [`keepalive`] – [`LinkWatchdog`][keepalive::LinkWatchdog]: detects
//!   half-open links that stopped producing traffic.
//! - [`gesture`] – pointer geometry, normalisation, and deadzone.
//! - [`gimbal`] – [`GimbalLimits`][gimbal::GimbalLimits]: normalised
//!   camera input to integer pan/tilt degrees.
//! - [`control`] – [`ControlChannel`][control::ControlChannel]: throttled
//!   command emission, the immediate stop on release, and the camera
//!   auto-center timer.

pub mod control;
pub mod gesture;
pub mod gimbal;
pub mod keepalive;
pub mod reconnect;
pub mod session;

pub use control::{ChannelSettings, ControlChannel};
pub use gesture::Point;
pub use gimbal::GimbalLimits;
pub use keepalive::{LinkHealth, LinkWatchdog};
pub use reconnect::ReconnectPolicy;
pub use session::{SessionAction, SessionEvent, SessionMachine, Transition};
