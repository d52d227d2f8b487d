//! Bounded outbound queue.
//!
//! DESIGN
//! ======
//! Messages sent while the connection is not open wait here and are replayed
//! in FIFO order on the next successful open. The queue is lossy under
//! pressure: once it holds `capacity` entries, admitting a new one evicts the
//! oldest. Callers are never told about the eviction; it is logged by the
//! session instead.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use frames::Outbound;
use uuid::Uuid;

/// An outbound frame waiting for a successful transmission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedMessage {
    pub id: Uuid,
    pub message: Outbound,
    /// Milliseconds since the Unix epoch when the message was first queued.
    pub enqueued_at: i64,
    /// Failed transmissions so far.
    pub attempts: u32,
}

impl QueuedMessage {
    #[must_use]
    pub fn new(message: Outbound) -> Self {
        Self { id: Uuid::new_v4(), message, enqueued_at: now_ms(), attempts: 0 }
    }
}

#[derive(Debug)]
pub struct OutboundQueue {
    entries: VecDeque<QueuedMessage>,
    capacity: usize,
}

impl OutboundQueue {
    /// Queue holding at most `capacity` entries (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { entries: VecDeque::with_capacity(capacity), capacity }
    }

    /// Append `entry`, returning the oldest entry if it had to be evicted.
    pub fn push(&mut self, entry: QueuedMessage) -> Option<QueuedMessage> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    /// Remove and return every entry in FIFO order.
    pub fn drain(&mut self) -> Vec<QueuedMessage> {
        self.entries.drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedMessage> {
        self.entries.iter()
    }
}

fn now_ms() -> i64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(duration.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod tests;
