//! Headless, typed, topic-based publish/subscribe bus for the presentation
//! layer.
//!
//! Uses [`tokio::sync::broadcast`] channels so that every subscriber
//! receives every message without any single subscriber blocking the
//! others. A subscriber that falls behind loses the oldest events instead of
//! growing an unbounded queue, which is exactly the latest-wins behaviour a
//! slow renderer needs.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Telemetry`] | Video frames, map parts, pose, status, sensor, FPS |
//! | [`Topic::Commands`] | Control commands as they leave for the vehicle |
//! | [`Topic::Advisories`] | Operator notifications |
//! | [`Topic::Session`] | Link state transitions |
//!
//! Every event is also copied onto a firehose channel for consumers such as
//! the operator console that want everything.

use teleop_types::{Event, EventPayload};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Telemetry,
    Commands,
    Advisories,
    Session,
}

impl Topic {
    /// The lane an event payload belongs on.
    pub fn for_payload(payload: &EventPayload) -> Topic {
        match payload {
            EventPayload::SessionChanged { .. } => Topic::Session,
            EventPayload::CommandSent(_) => Topic::Commands,
            EventPayload::Advisory(_) => Topic::Advisories,
            EventPayload::VideoFrame(_)
            | EventPayload::VideoLost { .. }
            | EventPayload::OccupancyGrid(_)
            | EventPayload::PointCloud(_)
            | EventPayload::Pose(_)
            | EventPayload::Status(_)
            | EventPayload::Sensor(_)
            | EventPayload::FrameRate(_) => Topic::Telemetry,
        }
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    firehose: broadcast::Sender<Event>,
    telemetry: broadcast::Sender<Event>,
    commands: broadcast::Sender<Event>,
    advisories: broadcast::Sender<Event>,
    session: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (firehose, _) = broadcast::channel(capacity);
        let (telemetry, _) = broadcast::channel(capacity);
        let (commands, _) = broadcast::channel(capacity);
        let (advisories, _) = broadcast::channel(capacity);
        let (session, _) = broadcast::channel(capacity);
        Self {
            firehose,
            telemetry,
            commands,
            advisories,
            session,
        }
    }

    /// Publish `event` on its topic lane and on the firehose.
    ///
    /// Returns the number of receivers handed the event across both
    /// channels. Having no subscribers is a normal condition for a
    /// presentation bus and yields `0`.
    pub fn publish(&self, event: Event) -> usize {
        let topic = Topic::for_payload(&event.payload);
        let on_topic = self.topic_sender(topic).send(event.clone()).unwrap_or(0);
        let on_firehose = self.firehose.send(event).unwrap_or(0);
        on_topic + on_firehose
    }

    /// Subscribe to a single [`Topic`] lane.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic: Some(topic),
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Subscribe to every event regardless of topic.
    pub fn subscribe_all(&self) -> TopicReceiver {
        TopicReceiver {
            topic: None,
            receiver: self.firehose.subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Telemetry => &self.telemetry,
            Topic::Commands => &self.commands,
            Topic::Advisories => &self.advisories,
            Topic::Session => &self.session,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to one [`Topic`] lane, or to the firehose.
pub struct TopicReceiver {
    topic: Option<Topic>,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event.
    ///
    /// Lagging is logged and skipped: the receiver resumes at the oldest
    /// event still buffered. Returns `None` once the bus has shut down.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "bus subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`][Self::recv]; `None` when nothing is
    /// buffered right now.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// The [`Topic`] this receiver is bound to; `None` for the firehose.
    pub fn topic(&self) -> Option<Topic> {
        self.topic
    }
}
