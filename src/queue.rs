//! Bounded FIFO of press events awaiting transmission.
//!
//! Insertion order is arrival order.  A failed delivery puts the event
//! back at the **front**, so it is retried before newer events; this
//! favours temporal order over starvation-avoidance.
//!
//! The queue is memory-resident only and capacity-bounded.  When full,
//! the oldest event is evicted and handed back to the caller so the
//! loss is reported, never silent.

use crate::app::ports::Timestamp;

/// Default number of pending events held in RAM.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// One recognised button press.  Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressEvent {
    press_timestamp: Timestamp,
}

impl PressEvent {
    pub const fn new(press_timestamp: Timestamp) -> Self {
        Self { press_timestamp }
    }

    /// UTC seconds since 1970 at which the press occurred.
    pub const fn press_timestamp(&self) -> Timestamp {
        self.press_timestamp
    }
}

/// Owned exclusively by the control loop; no internal locking.
pub struct EventQueue<const N: usize = DEFAULT_QUEUE_CAPACITY> {
    events: heapless::Deque<PressEvent, N>,
}

impl<const N: usize> Default for EventQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> EventQueue<N> {
    pub const fn new() -> Self {
        Self {
            events: heapless::Deque::new(),
        }
    }

    /// Append at the back.  Returns the evicted oldest event if the queue was full.
    pub fn enqueue(&mut self, event: PressEvent) -> Option<PressEvent> {
        match self.events.push_back(event) {
            Ok(()) => None,
            Err(event) => {
                let evicted = self.events.pop_front();
                // Cannot fail: one slot was just freed.
                let _ = self.events.push_back(event);
                evicted
            }
        }
    }

    pub fn peek_front(&self) -> Option<PressEvent> {
        self.events.front().copied()
    }

    pub fn pop_front(&mut self) -> Option<PressEvent> {
        self.events.pop_front()
    }

    /// Reinsert a failed event at the front.
    ///
    /// If newer events filled the queue in the meantime, the requeued
    /// event is itself the oldest and is returned as evicted.
    pub fn requeue_front(&mut self, event: PressEvent) -> Option<PressEvent> {
        self.events.push_front(event).err()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Pending events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PressEvent> {
        self.events.iter()
    }
}
