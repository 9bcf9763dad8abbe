//! `teleop-runtime` – The Operator Client Loop
//!
//! Wires the kernel state machines, the telemetry consumer, and the
//! notification relay onto one tokio task driven by a [`Transport`].
//!
//! # Modules
//!
//! - [`client`] – [`TeleopClient`][client::TeleopClient] and its
//!   [`ClientHandle`][client::ClientHandle]: the event loop, session action
//!   execution, the safety interlock, and the post-connect status poll.
//! - [`consumer`] – [`TelemetryConsumer`][consumer::TelemetryConsumer]:
//!   latest-wins video/map/pose/status/sensor state and the video
//!   placeholder latch.
//! - [`fps`] – [`FrameRateMeter`][fps::FrameRateMeter]: fixed one-second
//!   window frame-rate estimator.
//! - [`health`] – presentation bands (normal / warning / danger) for status
//!   metrics.
//! - [`notifications`] – [`NotificationRelay`][notifications::NotificationRelay]:
//!   persistent pane plus auto-dismissing toasts.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: the
//!   `tracing` subscriber with optional OTLP export.
//!
//! [`Transport`]: teleop_middleware::Transport

pub mod client;
pub mod consumer;
pub mod fps;
pub mod health;
pub mod notifications;
pub mod telemetry;

pub use client::{ClientConfig, ClientHandle, OperatorInput, TeleopClient};
pub use consumer::{ConsumerEffect, TelemetryConsumer};
pub use fps::FrameRateMeter;
pub use health::{Metric, MetricBand, classify, classify_status};
pub use notifications::NotificationRelay;
pub use telemetry::{TracerProviderGuard, init_tracing};
