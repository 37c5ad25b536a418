//! Timestamped parameter events.
//!
//! [`Timestamp`] is a signed 32.32 fixed-point count of seconds — enough
//! range for ±68 years and enough precision for tens of thousands of
//! divisions per sample at 48 kHz, so scheduled parameter changes can be
//! placed with sub-sample accuracy. [`EventQueue`] is a min-heap keyed on
//! that time: events pop in time order regardless of push order.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Signed 32.32 fixed-point seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Exactly one second.
    pub const ONE_SECOND: Self = Self(1_i64 << 32);

    /// Zero time.
    pub const ZERO: Self = Self(0);

    /// Convert from floating-point seconds.
    pub fn from_seconds(seconds: f64) -> Self {
        Self((seconds * Self::ONE_SECOND.0 as f64) as i64)
    }

    /// Convert to floating-point seconds.
    pub fn to_seconds(self) -> f64 {
        self.0 as f64 / Self::ONE_SECOND.0 as f64
    }

    /// Duration of one frame at the given sample rate.
    ///
    /// Integrating this can undershoot by one sample over a few seconds of
    /// audio; callers that care re-anchor at block boundaries.
    pub fn per_sample(samplerate: u32) -> Self {
        Self(Self::ONE_SECOND.0 / i64::from(samplerate))
    }
}

impl core::ops::Add for Timestamp {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl core::ops::Sub for Timestamp {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

/// A payload scheduled for a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event<T> {
    /// When the event fires.
    pub time: Timestamp,
    /// The scheduled change.
    pub payload: T,
}

/// Heap slot ordering: earliest time first, push order as tiebreaker.
struct Slot<T> {
    key: Reverse<(Timestamp, u64)>,
    payload: T,
}

impl<T> PartialEq for Slot<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for Slot<T> {}

impl<T> PartialOrd for Slot<T> {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Slot<T> {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

/// Min-heap of timestamped events.
pub struct EventQueue<T> {
    heap: BinaryHeap<Slot<T>>,
    sequence: u64,
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventQueue<T> {
    /// An empty queue.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            sequence: 0,
        }
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Schedule an event. Events with equal times pop in push order.
    pub fn push(&mut self, time: Timestamp, payload: T) {
        let sequence = self.sequence;
        self.sequence += 1;
        self.heap.push(Slot {
            key: Reverse((time, sequence)),
            payload,
        });
    }

    /// Time of the earliest event, if any.
    pub fn peek_time(&self) -> Option<Timestamp> {
        self.heap.peek().map(|slot| slot.key.0.0)
    }

    /// Pop the earliest event if it is due at or before `now`.
    pub fn pop_due(&mut self, now: Timestamp) -> Option<Event<T>> {
        if self.peek_time()? <= now {
            self.heap.pop().map(|slot| Event {
                time: slot.key.0.0,
                payload: slot.payload,
            })
        } else {
            None
        }
    }

    /// Drop all events.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_time_order() {
        let mut queue = EventQueue::new();
        queue.push(Timestamp::from_seconds(3.0), "c");
        queue.push(Timestamp::from_seconds(1.0), "a");
        queue.push(Timestamp::from_seconds(2.0), "b");

        let now = Timestamp::from_seconds(10.0);
        assert_eq!(queue.pop_due(now).unwrap().payload, "a");
        assert_eq!(queue.pop_due(now).unwrap().payload, "b");
        assert_eq!(queue.pop_due(now).unwrap().payload, "c");
        assert!(queue.pop_due(now).is_none());
    }

    #[test]
    fn holds_future_events() {
        let mut queue = EventQueue::new();
        queue.push(Timestamp::from_seconds(5.0), ());
        assert!(queue.pop_due(Timestamp::from_seconds(4.9)).is_none());
        assert!(queue.pop_due(Timestamp::from_seconds(5.0)).is_some());
    }

    #[test]
    fn equal_times_pop_in_push_order() {
        let mut queue = EventQueue::new();
        let t = Timestamp::from_seconds(1.0);
        queue.push(t, 1);
        queue.push(t, 2);
        queue.push(t, 3);
        assert_eq!(queue.pop_due(t).unwrap().payload, 1);
        assert_eq!(queue.pop_due(t).unwrap().payload, 2);
        assert_eq!(queue.pop_due(t).unwrap().payload, 3);
    }

    #[test]
    fn per_sample_accumulates_to_one_second() {
        let step = Timestamp::per_sample(48000);
        let mut t = Timestamp::ZERO;
        for _ in 0..48000 {
            t = t + step;
        }
        // Integer division loses at most one part in 2^32 per sample.
        let error = (t.to_seconds() - 1.0).abs();
        assert!(error < 1e-4, "accumulated error {error}");
    }

    #[test]
    fn timestamp_seconds_round_trip() {
        for seconds in [-2.5_f64, 0.0, 0.25, 1.0, 1234.5] {
            let t = Timestamp::from_seconds(seconds);
            assert!((t.to_seconds() - seconds).abs() < 1e-6);
        }
    }
}
