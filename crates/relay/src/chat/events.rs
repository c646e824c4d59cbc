//! In-process fan-out for events published to webapp clients.
//!
//! Published events are delivered to every live `GET /events` stream whose
//! user matches. Events published with no listener are dropped.

use devops_relay_core::UserId;
use serde::Serialize;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

/// One event addressed to a single user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostEvent {
    pub event: String,
    #[serde(skip)]
    pub user_id: UserId,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<HostEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventHub {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns how many streams received the event.
    pub fn publish(&self, event: HostEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.sender.subscribe()
    }
}
