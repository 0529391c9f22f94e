//! Event handoff between the sampling callback and the poll.
//!
//! The two run on independent timers and may preempt each other. Each
//! sample's events go through a lock-free SPSC ring: the sampler owns the
//! [`EventSender`], the poll owns the [`EventReceiver`], and neither side
//! touches state the other owns. The poll sees every sample's masks in
//! order, so a channel that scores twice between polls counts twice.

use ringbuf::{
    HeapCons, HeapProd, HeapRb,
    traits::{Consumer, Observer, Producer, Split},
};

use crate::DebounceEvents;

/// Ring slots for events between two polls. Empty samples are not queued,
/// so this covers far more than one 100 ms poll period of 1 ms samples.
pub const EVENT_QUEUE_DEPTH: usize = 256;

/// Build a connected sender/receiver pair holding up to `capacity` events.
#[must_use]
pub fn event_queue(capacity: usize) -> (EventSender, EventReceiver) {
    let (producer, consumer) = HeapRb::<DebounceEvents>::new(capacity.max(1)).split();
    (
        EventSender {
            producer,
            overflow: None,
            published: 0,
            merged: 0,
        },
        EventReceiver { consumer },
    )
}

/// Producer side, owned by the sampling callback.
pub struct EventSender {
    producer: HeapProd<DebounceEvents>,
    /// Events that found the ring full, merged until there is room.
    overflow: Option<DebounceEvents>,
    published: u64,
    merged: u64,
}

impl EventSender {
    /// Queue one sample's events. Empty sets are skipped.
    ///
    /// If the ring is full the events are merged into one pending set and
    /// queued as soon as the poll makes room; only then can repeats of one
    /// channel collapse.
    pub fn publish(&mut self, events: DebounceEvents) {
        if events.is_empty() {
            return;
        }
        self.published += 1;

        if let Some(pending) = self.overflow.take() {
            if let Err(mut pending) = self.producer.try_push(pending) {
                pending.merge(events);
                self.overflow = Some(pending);
                self.merged += 1;
                return;
            }
        }
        if let Err(events) = self.producer.try_push(events) {
            log::warn!("debounce event queue full, merging until the next poll");
            self.overflow = Some(events);
        }
    }

    /// Non-empty event sets published since construction.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published
    }

    /// Event sets folded into another because the ring was full.
    #[must_use]
    pub fn merged(&self) -> u64 {
        self.merged
    }
}

/// Consumer side, owned by the game-state poll.
pub struct EventReceiver {
    consumer: HeapCons<DebounceEvents>,
}

impl EventReceiver {
    /// Oldest queued event set.
    pub fn pop(&mut self) -> Option<DebounceEvents> {
        self.consumer.try_pop()
    }

    /// Everything queued, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = DebounceEvents> + '_ {
        std::iter::from_fn(move || self.consumer.try_pop())
    }

    /// Event sets waiting.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.consumer.occupied_len()
    }
}
