//! [`LinkWatchdog`] – dead-link detector.
//!
//! The vehicle emits a heartbeat every 25 s and telemetry far more often.
//! Every inbound frame counts as activity; when nothing at all has arrived
//! for the configured timeout the link is declared dead even if the socket
//! never reported closure (half-open TCP, sleeping Wi-Fi bridge, …).
//!
//! The watchdog is only armed while the session is connected.

use std::time::{Duration, Instant};

/// Default silence tolerated before the link is considered dead.
pub const DEFAULT_KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

/// Health of the link as judged by traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkHealth {
    /// Armed and traffic seen within the timeout.
    Alive,
    /// Armed and silent past the timeout.
    Silent,
    /// Not armed (no link to judge).
    Idle,
}

/// Tracks the last inbound activity on the link.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use teleop_kernel::keepalive::{LinkHealth, LinkWatchdog};
///
/// let start = Instant::now();
/// let mut wd = LinkWatchdog::new(Duration::from_secs(60));
/// wd.arm(start);
/// wd.heartbeat(start + Duration::from_secs(30));
///
/// assert_eq!(wd.health(start + Duration::from_secs(80)), LinkHealth::Alive);
/// assert_eq!(wd.health(start + Duration::from_secs(91)), LinkHealth::Silent);
/// ```
#[derive(Debug, Clone)]
pub struct LinkWatchdog {
    timeout: Duration,
    last_activity: Option<Instant>,
}

impl Default for LinkWatchdog {
    fn default() -> Self {
        Self::new(DEFAULT_KEEPALIVE_TIMEOUT)
    }
}

impl LinkWatchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_activity: None,
        }
    }

    /// Start judging the link; `now` counts as the first activity.
    pub fn arm(&mut self, now: Instant) {
        self.last_activity = Some(now);
    }

    pub fn disarm(&mut self) {
        self.last_activity = None;
    }

    /// Record inbound activity. No-op while disarmed.
    pub fn heartbeat(&mut self, now: Instant) {
        if let Some(last) = self.last_activity.as_mut() {
            *last = (*last).max(now);
        }
    }

    pub fn health(&self, now: Instant) -> LinkHealth {
        match self.last_activity {
            None => LinkHealth::Idle,
            Some(last) if now.saturating_duration_since(last) > self.timeout => LinkHealth::Silent,
            Some(_) => LinkHealth::Alive,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.health(now) == LinkHealth::Silent
    }

    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }

    /// The instant at which the link will be declared dead if nothing
    /// arrives; `None` while disarmed.
    pub fn deadline(&self) -> Option<Instant> {
        self.last_activity.map(|last| last + self.timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn fresh_watchdog_is_idle() {
        let wd = LinkWatchdog::default();
        assert_eq!(wd.health(Instant::now()), LinkHealth::Idle);
        assert!(wd.deadline().is_none());
    }

    #[test]
    fn heartbeat_resets_deadline() {
        let t0 = Instant::now();
        let mut wd = LinkWatchdog::new(secs(60));
        wd.arm(t0);
        wd.heartbeat(t0 + secs(50));
        assert_eq!(wd.health(t0 + secs(100)), LinkHealth::Alive);
        assert_eq!(wd.deadline(), Some(t0 + secs(110)));
    }

    #[test]
    fn silent_link_expires() {
        let t0 = Instant::now();
        let mut wd = LinkWatchdog::new(secs(60));
        wd.arm(t0);
        assert!(!wd.is_expired(t0 + secs(60)));
        assert!(wd.is_expired(t0 + secs(61)));
    }

    #[test]
    fn heartbeat_while_disarmed_is_noop() {
        let t0 = Instant::now();
        let mut wd = LinkWatchdog::new(secs(1));
        wd.heartbeat(t0);
        assert_eq!(wd.health(t0), LinkHealth::Idle);
    }

    #[test]
    fn out_of_order_heartbeat_never_moves_backwards() {
        let t0 = Instant::now();
        let mut wd = LinkWatchdog::new(secs(10));
        wd.arm(t0 + secs(5));
        wd.heartbeat(t0);
        assert_eq!(wd.last_activity(), Some(t0 + secs(5)));
    }

    #[test]
    fn disarm_then_rearm_resets_timer() {
        let t0 = Instant::now();
        let mut wd = LinkWatchdog::new(secs(1));
        wd.arm(t0);
        assert!(wd.is_expired(t0 + secs(5)));
        wd.disarm();
        assert_eq!(wd.health(t0 + secs(5)), LinkHealth::Idle);
        wd.arm(t0 + secs(5));
        assert_eq!(wd.health(t0 + secs(5)), LinkHealth::Alive);
    }
}
