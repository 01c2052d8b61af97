//! Process-wide wake-up channel for suspended sync calls.
//!
//! Every event append publishes one payload on a single
//! `tokio::sync::broadcast` channel. A waiting sync subscribes and filters
//! payloads locally by recipient.

use std::sync::Arc;

use tokio::sync::broadcast;

/// Slow receivers that fall behind skip payloads (`RecvError::Lagged`) and
/// must recompute from the store.
const BROADCAST_CAPACITY: usize = 4096;

/// Notice that a room's timeline grew.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelinePayload {
    pub room_id: String,
    /// Position of the appended event.
    pub position: u64,
    /// Users who can see the event: members, invitees, and the membership target.
    pub recipients: Vec<String>,
}

impl TimelinePayload {
    pub fn concerns(&self, user_id: &str) -> bool {
        self.recipients.iter().any(|r| r == user_id)
    }
}

#[derive(Clone)]
pub struct SyncBroadcast {
    sender: broadcast::Sender<Arc<TimelinePayload>>,
}

impl SyncBroadcast {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    /// A receiver that sees every payload dispatched after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<TimelinePayload>> {
        self.sender.subscribe()
    }

    /// Number of syncs currently waiting.
    pub fn waiting(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn dispatch(&self, payload: TimelinePayload) {
        // Err only means nobody is waiting.
        let _ = self.sender.send(Arc::new(payload));
    }
}

impl Default for SyncBroadcast {
    fn default() -> Self {
        Self::new()
    }
}
