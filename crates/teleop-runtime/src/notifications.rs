//! [`NotificationRelay`] – operator advisories.
//!
//! Every [`post`](NotificationRelay::post) lands in two places:
//!
//! - the persistent pane, most recent first, capped at [`PANE_CAPACITY`];
//! - the transient toast list, in arrival order, each toast removed once
//!   its display duration has passed.
//!
//! Nothing is merged or suppressed by content. Posting is also published
//! on the bus as [`EventPayload::Advisory`] so renderers can draw it.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use teleop_middleware::EventBus;
use teleop_types::{Event, EventPayload, Notification, Severity};
use tracing::{debug, error, info, warn};

/// Entries kept in the persistent pane.
pub const PANE_CAPACITY: usize = 50;

/// Default time a toast stays visible.
pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct Toast {
    notification: Notification,
    expires_at: Instant,
}

pub struct NotificationRelay {
    bus: EventBus,
    toast_duration: Duration,
    pane: VecDeque<Notification>,
    toasts: VecDeque<Toast>,
}

impl NotificationRelay {
    pub fn new(bus: EventBus, toast_duration: Duration) -> Self {
        Self {
            bus,
            toast_duration,
            pane: VecDeque::with_capacity(PANE_CAPACITY),
            toasts: VecDeque::new(),
        }
    }

    /// Surface an advisory.
    pub fn post(
        &mut self,
        message: impl Into<String>,
        severity: Severity,
        now: Instant,
    ) -> Notification {
        let notification = Notification::new(message, severity);
        match severity {
            Severity::Danger => error!(message = %notification.message, "advisory"),
            Severity::Warning => warn!(message = %notification.message, "advisory"),
            Severity::Info | Severity::Success => {
                info!(message = %notification.message, "advisory")
            }
        }

        self.pane.push_front(notification.clone());
        self.pane.truncate(PANE_CAPACITY);
        self.toasts.push_back(Toast {
            notification: notification.clone(),
            expires_at: now + self.toast_duration,
        });

        self.bus.publish(Event::new(
            "notifications",
            EventPayload::Advisory(notification.clone()),
        ));
        notification
    }

    /// Drop toasts whose display time is over; returns them oldest first.
    pub fn expire(&mut self, now: Instant) -> Vec<Notification> {
        let mut expired = Vec::new();
        while let Some(front) = self.toasts.front() {
            if front.expires_at > now {
                break;
            }
            if let Some(toast) = self.toasts.pop_front() {
                debug!(message = %toast.notification.message, "toast dismissed");
                expired.push(toast.notification);
            }
        }
        expired
    }

    /// When the oldest visible toast goes away.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.toasts.front().map(|t| t.expires_at)
    }

    /// Persistent pane, most recent first.
    pub fn pane(&self) -> impl Iterator<Item = &Notification> {
        self.pane.iter()
    }

    /// Visible toasts in arrival order.
    pub fn toasts(&self) -> impl Iterator<Item = &Notification> {
        self.toasts.iter().map(|t| &t.notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teleop_middleware::Topic;

    fn relay() -> NotificationRelay {
        NotificationRelay::new(EventBus::default(), DEFAULT_TOAST_DURATION)
    }

    #[test]
    fn pane_is_most_recent_first_and_toasts_arrival_order() {
        let now = Instant::now();
        let mut relay = relay();
        relay.post("first", Severity::Info, now);
        relay.post("second", Severity::Warning, now);

        let pane: Vec<_> = relay.pane().map(|n| n.message.as_str()).collect();
        assert_eq!(pane, vec!["second", "first"]);
        let toasts: Vec<_> = relay.toasts().map(|n| n.message.as_str()).collect();
        assert_eq!(toasts, vec!["first", "second"]);
    }

    #[test]
    fn identical_messages_are_not_merged() {
        let now = Instant::now();
        let mut relay = relay();
        relay.post("same", Severity::Info, now);
        relay.post("same", Severity::Info, now);
        assert_eq!(relay.pane().count(), 2);
        assert_eq!(relay.toasts().count(), 2);
    }

    #[test]
    fn toasts_expire_after_duration_but_pane_keeps_them() {
        let t0 = Instant::now();
        let mut relay = relay();
        relay.post("a", Severity::Info, t0);
        relay.post("b", Severity::Info, t0 + Duration::from_secs(2));
        assert_eq!(relay.next_expiry(), Some(t0 + Duration::from_secs(5)));

        assert!(relay.expire(t0 + Duration::from_millis(4999)).is_empty());
        let gone = relay.expire(t0 + Duration::from_secs(5));
        assert_eq!(gone.len(), 1);
        assert_eq!(gone[0].message, "a");
        assert_eq!(relay.next_expiry(), Some(t0 + Duration::from_secs(7)));
        assert_eq!(relay.pane().count(), 2);
    }

    #[test]
    fn pane_is_capped() {
        let now = Instant::now();
        let mut relay = relay();
        for i in 0..(PANE_CAPACITY + 10) {
            relay.post(format!("n{i}"), Severity::Info, now);
        }
        assert_eq!(relay.pane().count(), PANE_CAPACITY);
        assert_eq!(relay.pane().next().map(|n| n.message.as_str()), Some("n59"));
    }

    #[tokio::test]
    async fn post_is_published_on_advisory_topic() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Advisories);
        let mut relay = NotificationRelay::new(bus, DEFAULT_TOAST_DURATION);
        relay.post("IMU Calibration Complete", Severity::Success, Instant::now());

        let event = rx.recv().await.unwrap();
        let EventPayload::Advisory(n) = event.payload else {
            panic!("expected an advisory");
        };
        assert_eq!(n.severity, Severity::Success);
        assert_eq!(n.message, "IMU Calibration Complete");
    }
}
