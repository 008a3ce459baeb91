//! Notification channel: fire-and-forget topic publishing.
//!
//! The pool and the activity log publish here; the WebSocket transport
//! subscribes. Publishers never wait on subscribers.

use tokio::sync::broadcast;

/// Topics published by the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Topic {
    /// One timestamped text line per mutation or lifecycle event.
    #[serde(rename = "logs")]
    Logs,
    /// `{"totalTickets": T, "availableTickets": A}` after every mutation.
    #[serde(rename = "ticketAvailability")]
    TicketAvailability,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logs => "logs",
            Self::TicketAvailability => "ticketAvailability",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published message as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Notification {
    pub topic: Topic,
    pub payload: String,
}

/// Publish side of the notification channel.
///
/// Implementations must tolerate concurrent publishes from every worker.
pub trait Notifier: Send + Sync {
    fn publish(&self, topic: Topic, payload: String);
}

/// Notifier that drops everything. Used when nobody observes the simulation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn publish(&self, _topic: Topic, _payload: String) {}
}

/// Broadcast-backed notifier.
///
/// A subscriber that falls behind by more than `capacity` messages skips
/// ahead (`RecvError::Lagged`) instead of slowing publishers down.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub const DEFAULT_CAPACITY: usize = 4096;

    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl Notifier for BroadcastNotifier {
    fn publish(&self, topic: Topic, payload: String) {
        // Err only means there are no subscribers right now.
        let _ = self.tx.send(Notification { topic, payload });
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::{Notification, Notifier, Topic};

    /// Records every publish for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        published: Mutex<Vec<Notification>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn all(&self) -> Vec<Notification> {
            self.published.lock().unwrap().clone()
        }

        pub fn on(&self, topic: Topic) -> Vec<String> {
            self.published
                .lock()
                .unwrap()
                .iter()
                .filter(|n| n.topic == topic)
                .map(|n| n.payload.clone())
                .collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn publish(&self, topic: Topic, payload: String) {
            self.published
                .lock()
                .unwrap()
                .push(Notification { topic, payload });
        }
    }
}
