//! [`SessionMachine`] – link lifecycle as an explicit transition table.
//!
//! ```text
//!                 Connect                 Opened
//!  Disconnected ───────────► Connecting ─────────► Connected
//!       ▲                        │                   │  │
//!       │ Disconnect             │ OpenFailed        │  │ Closed /
//!       │ (from any state)       ▼                   │  │ KeepaliveExpired
//!       │                  Reconnecting ◄────────────┘  │
//!       │                    │     ▲  RetryDue → OpenChannel
//!       │   N failures       │     └──────────────────────┘
//!       │                    ▼
//!       └────────────────  Failed  ── Connect (operator retry) ──► Connecting
//! ```
//!
//! [`SessionMachine::handle`] is the only mutator. It returns the list of
//! [`SessionAction`]s the driver must carry out, in order. Whenever the
//! machine *enters* a link-down state (Disconnected, Reconnecting, Failed)
//! the first action is [`SessionAction::ForceSafeState`].

use std::time::{Duration, Instant};

use teleop_types::{SessionState, Severity};
use tracing::{debug, info};

use crate::keepalive::LinkWatchdog;
use crate::reconnect::ReconnectPolicy;

/// Inputs to the session machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Operator asked to connect (also used for an explicit retry).
    Connect,
    /// The transport finished opening.
    Opened,
    /// An open attempt failed.
    OpenFailed(String),
    /// An established link closed or errored.
    Closed(String),
    /// No inbound activity for the keepalive timeout.
    KeepaliveExpired,
    /// The scheduled retry delay elapsed.
    RetryDue,
    /// Operator asked to disconnect.
    Disconnect,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Dial the transport.
    OpenChannel,
    /// Tear down the transport.
    CloseChannel,
    /// Zero every control channel and suspend emission.
    ForceSafeState,
    /// Re-enable control channels.
    ResumeControls,
    /// Fetch current status instead of waiting for the next push.
    RequestStateRefresh,
    /// Fire [`SessionEvent::RetryDue`] after this delay.
    ScheduleRetry(Duration),
    CancelRetry,
    /// Surface an operator advisory.
    Advise { message: String, severity: Severity },
}

/// Result of one [`SessionMachine::handle`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
    pub actions: Vec<SessionAction>,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }

    pub fn is_noop(&self) -> bool {
        !self.changed() && self.actions.is_empty()
    }
}

/// The session: state, consecutive failed attempts, last inbound activity.
#[derive(Debug)]
pub struct SessionMachine {
    state: SessionState,
    failed_attempts: u32,
    policy: ReconnectPolicy,
    watchdog: LinkWatchdog,
}

impl SessionMachine {
    pub fn new(policy: ReconnectPolicy, keepalive_timeout: Duration) -> Self {
        Self {
            state: SessionState::Disconnected,
            failed_attempts: 0,
            policy,
            watchdog: LinkWatchdog::new(keepalive_timeout),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Record inbound activity on the link.
    pub fn record_activity(&mut self, now: Instant) {
        self.watchdog.heartbeat(now);
    }

    pub fn last_activity(&self) -> Option<Instant> {
        self.watchdog.last_activity()
    }

    /// When the keepalive will expire if nothing arrives; `None` unless
    /// connected.
    pub fn keepalive_deadline(&self) -> Option<Instant> {
        self.watchdog.deadline()
    }

    /// `true` when connected and silent past the keepalive timeout.
    pub fn keepalive_expired(&self, now: Instant) -> bool {
        self.state == SessionState::Connected && self.watchdog.is_expired(now)
    }

    /// Apply one event.
    pub fn handle(&mut self, event: SessionEvent, now: Instant) -> Transition {
        use SessionAction as A;
        use SessionState::*;

        let from = self.state;
        let (to, mut actions) = match (from, &event) {
            (Disconnected | Failed, SessionEvent::Connect) => {
                self.failed_attempts = 0;
                (Connecting, vec![A::OpenChannel])
            }
            (Reconnecting, SessionEvent::Connect) => {
                (Reconnecting, vec![A::CancelRetry, A::OpenChannel])
            }
            (Connecting | Reconnecting, SessionEvent::Opened) => {
                self.failed_attempts = 0;
                self.watchdog.arm(now);
                (
                    Connected,
                    vec![
                        A::CancelRetry,
                        A::ResumeControls,
                        A::RequestStateRefresh,
                        advise("Connected to vehicle", Severity::Success),
                    ],
                )
            }
            (Connecting | Reconnecting, SessionEvent::OpenFailed(reason)) => {
                self.failed_attempts += 1;
                let attempt = self.failed_attempts;
                let max = self.policy.max_attempts;
                if self.policy.is_exhausted(attempt) {
                    (
                        Failed,
                        vec![advise(
                            format!("Connection failed after {attempt} attempts: {reason}. Retry manually."),
                            Severity::Danger,
                        )],
                    )
                } else {
                    (
                        Reconnecting,
                        vec![
                            A::ScheduleRetry(self.policy.delay_for(attempt)),
                            advise(
                                format!("Connection attempt {attempt}/{max} failed: {reason}"),
                                Severity::Warning,
                            ),
                        ],
                    )
                }
            }
            (Reconnecting, SessionEvent::RetryDue) => (Reconnecting, vec![A::OpenChannel]),
            (Connected, SessionEvent::Closed(reason)) => {
                self.failed_attempts = 0;
                (
                    Reconnecting,
                    vec![
                        A::CloseChannel,
                        A::ScheduleRetry(self.policy.delay_for(1)),
                        advise(format!("Connection lost: {reason}"), Severity::Warning),
                    ],
                )
            }
            (Connected, SessionEvent::KeepaliveExpired) => {
                self.failed_attempts = 0;
                let silence = self.watchdog.timeout().as_secs();
                (
                    Reconnecting,
                    vec![
                        A::CloseChannel,
                        A::ScheduleRetry(self.policy.delay_for(1)),
                        advise(
                            format!("No traffic from vehicle for {silence}s; reconnecting"),
                            Severity::Warning,
                        ),
                    ],
                )
            }
            (Connecting | Connected | Reconnecting | Failed, SessionEvent::Disconnect) => {
                self.failed_attempts = 0;
                (
                    Disconnected,
                    vec![
                        A::CloseChannel,
                        A::CancelRetry,
                        advise("Disconnected from vehicle", Severity::Info),
                    ],
                )
            }
            (state, event) => {
                debug!(%state, ?event, "session event ignored");
                return Transition {
                    from,
                    to: from,
                    actions: Vec::new(),
                };
            }
        };

        if to != Connected {
            self.watchdog.disarm();
        }
        if to != from && matches!(to, Disconnected | Reconnecting | Failed) {
            actions.insert(0, A::ForceSafeState);
        }
        if to != from {
            info!(%from, %to, attempts = self.failed_attempts, "session transition");
        }
        self.state = to;
        Transition { from, to, actions }
    }
}

fn advise(message: impl Into<String>, severity: Severity) -> SessionAction {
    SessionAction::Advise {
        message: message.into(),
        severity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> SessionMachine {
        SessionMachine::new(ReconnectPolicy::default(), Duration::from_secs(60))
    }

    fn connected(now: Instant) -> SessionMachine {
        let mut m = machine();
        m.handle(SessionEvent::Connect, now);
        m.handle(SessionEvent::Opened, now);
        m
    }

    fn has(t: &Transition, wanted: &SessionAction) -> bool {
        t.actions.iter().any(|a| a == wanted)
    }

    fn severity_of(t: &Transition) -> Option<Severity> {
        t.actions.iter().find_map(|a| match a {
            SessionAction::Advise { severity, .. } => Some(*severity),
            _ => None,
        })
    }

    #[test]
    fn connect_then_open() {
        let now = Instant::now();
        let mut m = machine();
        let t = m.handle(SessionEvent::Connect, now);
        assert_eq!(t.to, SessionState::Connecting);
        assert_eq!(t.actions, vec![SessionAction::OpenChannel]);

        let t = m.handle(SessionEvent::Opened, now);
        assert_eq!(t.to, SessionState::Connected);
        assert!(has(&t, &SessionAction::ResumeControls));
        assert!(has(&t, &SessionAction::RequestStateRefresh));
        assert_eq!(severity_of(&t), Some(Severity::Success));
        assert_eq!(m.keepalive_deadline(), Some(now + Duration::from_secs(60)));
    }

    #[test]
    fn link_loss_forces_safe_state_first() {
        let now = Instant::now();
        let mut m = connected(now);
        let t = m.handle(SessionEvent::Closed("reset by peer".into()), now);
        assert_eq!(t.to, SessionState::Reconnecting);
        assert_eq!(t.actions[0], SessionAction::ForceSafeState);
        assert!(has(&t, &SessionAction::CloseChannel));
        assert!(has(&t, &SessionAction::ScheduleRetry(Duration::from_secs(1))));
        assert!(m.keepalive_deadline().is_none());
    }

    #[test]
    fn disconnect_forces_safe_state_first() {
        let now = Instant::now();
        let mut m = connected(now);
        let t = m.handle(SessionEvent::Disconnect, now);
        assert_eq!(t.to, SessionState::Disconnected);
        assert_eq!(t.actions[0], SessionAction::ForceSafeState);
        assert!(has(&t, &SessionAction::CancelRetry));
        assert_eq!(severity_of(&t), Some(Severity::Info));
    }

    #[test]
    fn keepalive_expiry_triggers_reconnect() {
        let now = Instant::now();
        let mut m = connected(now);
        m.record_activity(now + Duration::from_secs(30));
        assert!(!m.keepalive_expired(now + Duration::from_secs(90)));
        assert!(m.keepalive_expired(now + Duration::from_secs(91)));

        let t = m.handle(SessionEvent::KeepaliveExpired, now + Duration::from_secs(91));
        assert_eq!(t.to, SessionState::Reconnecting);
        assert_eq!(t.actions[0], SessionAction::ForceSafeState);
        assert!(!m.keepalive_expired(now + Duration::from_secs(500)));
    }

    #[test]
    fn keepalive_is_only_judged_while_connected() {
        let now = Instant::now();
        let mut m = machine();
        m.handle(SessionEvent::Connect, now);
        assert!(!m.keepalive_expired(now + Duration::from_secs(3600)));
    }

    #[test]
    fn retries_are_bounded() {
        let now = Instant::now();
        let mut m = machine();
        m.handle(SessionEvent::Connect, now);

        let mut opens = 1;
        loop {
            let t = m.handle(SessionEvent::OpenFailed("refused".into()), now);
            if t.to == SessionState::Failed {
                assert_eq!(severity_of(&t), Some(Severity::Danger));
                assert!(!t.actions.iter().any(|a| matches!(a, SessionAction::ScheduleRetry(_))));
                break;
            }
            assert!(has(&t, &SessionAction::ScheduleRetry(Duration::from_secs(1))));
            let t = m.handle(SessionEvent::RetryDue, now);
            assert_eq!(t.actions, vec![SessionAction::OpenChannel]);
            opens += 1;
        }
        assert_eq!(opens, 10);
        assert_eq!(m.failed_attempts(), 10);

        // No automatic attempt from Failed.
        assert!(m.handle(SessionEvent::RetryDue, now).is_noop());
        assert_eq!(m.state(), SessionState::Failed);

        // Operator retry starts a fresh budget.
        let t = m.handle(SessionEvent::Connect, now);
        assert_eq!(t.to, SessionState::Connecting);
        assert_eq!(m.failed_attempts(), 0);
    }

    #[test]
    fn first_failure_from_connecting_forces_safe_state() {
        let now = Instant::now();
        let mut m = machine();
        m.handle(SessionEvent::Connect, now);
        let t = m.handle(SessionEvent::OpenFailed("refused".into()), now);
        assert_eq!(t.to, SessionState::Reconnecting);
        assert_eq!(t.actions[0], SessionAction::ForceSafeState);

        // Staying in Reconnecting does not repeat it.
        m.handle(SessionEvent::RetryDue, now);
        let t = m.handle(SessionEvent::OpenFailed("refused".into()), now);
        assert!(!has(&t, &SessionAction::ForceSafeState));
    }

    #[test]
    fn successful_reconnect_resets_counter() {
        let now = Instant::now();
        let mut m = connected(now);
        m.handle(SessionEvent::Closed("eof".into()), now);
        m.handle(SessionEvent::RetryDue, now);
        m.handle(SessionEvent::OpenFailed("refused".into()), now);
        assert_eq!(m.failed_attempts(), 1);
        m.handle(SessionEvent::RetryDue, now);
        let t = m.handle(SessionEvent::Opened, now);
        assert_eq!(t.to, SessionState::Connected);
        assert_eq!(m.failed_attempts(), 0);
    }

    #[test]
    fn operator_retry_while_reconnecting_dials_now() {
        let now = Instant::now();
        let mut m = connected(now);
        m.handle(SessionEvent::Closed("eof".into()), now);
        let t = m.handle(SessionEvent::Connect, now);
        assert_eq!(t.to, SessionState::Reconnecting);
        assert_eq!(t.actions, vec![SessionAction::CancelRetry, SessionAction::OpenChannel]);
    }

    #[test]
    fn irrelevant_events_are_noops() {
        let now = Instant::now();
        let mut m = machine();
        assert!(m.handle(SessionEvent::Disconnect, now).is_noop());
        assert!(m.handle(SessionEvent::Opened, now).is_noop());
        assert!(m.handle(SessionEvent::Closed("late".into()), now).is_noop());

        let mut m = connected(now);
        assert!(m.handle(SessionEvent::Connect, now).is_noop());
        assert!(m.handle(SessionEvent::RetryDue, now).is_noop());
        assert_eq!(m.state(), SessionState::Connected);
    }
}
