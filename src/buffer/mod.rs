//! Bounded in-memory message queues.
//!
//! A `MessageBuffer` is the unit of storage: one named FIFO per metric,
//! owned either by the [`GlobalBuffer`](global/struct.GlobalBuffer.html) or
//! by an aggregation operation.

use message::Message;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub mod global;

pub use self::global::GlobalBuffer;

/// A named bounded FIFO of messages with a configurable full-buffer policy.
pub struct MessageBuffer {
    name: String,
    max_size: usize,
    drop_oldest: bool,
    inner: Mutex<Inner>,
}

struct Inner {
    messages: VecDeque<Arc<Message>>,
    high_water_mark: usize,
}

impl MessageBuffer {
    /// Create an empty buffer.
    ///
    /// `drop_oldest` selects the behaviour once `max_size` is reached: true
    /// evicts the oldest message to make room, false refuses the incoming
    /// one.
    pub fn new(name: &str, max_size: usize, drop_oldest: bool) -> MessageBuffer {
        MessageBuffer {
            name: name.to_string(),
            max_size: max_size,
            drop_oldest: drop_oldest,
            inner: Mutex::new(Inner {
                messages: VecDeque::new(),
                high_water_mark: 0,
            }),
        }
    }

    /// Append a message, applying the full-buffer policy. Returns false only
    /// when the buffer is full and configured to refuse new messages.
    pub fn add(&self, message: Arc<Message>) -> bool {
        let mut inner = self.inner.lock().unwrap();

        if inner.messages.len() >= self.max_size {
            if self.drop_oldest {
                warn!(
                    "buffer '{}' has reached its max size, dropping oldest message",
                    self.name
                );
                inner.messages.pop_front();
            } else {
                warn!(
                    "buffer '{}' is full, dropping incoming message: {}",
                    self.name,
                    message.serialize()
                );
                return false;
            }
        }

        inner.messages.push_back(message);

        let current = inner.messages.len();
        if current > inner.high_water_mark {
            inner.high_water_mark = current;
        }

        true
    }

    /// Move up to `nbr` messages into `target`, oldest first. A `nbr` of
    /// zero means take everything.
    pub fn take(&self, nbr: usize, target: &mut Vec<Arc<Message>>) {
        let mut inner = self.inner.lock().unwrap();

        if inner.messages.is_empty() {
            return;
        }

        let available = inner.messages.len();
        let nbr = if nbr == 0 || nbr > available {
            available
        } else {
            nbr
        };

        target.reserve(nbr);
        for _ in 0..nbr {
            target.push(inner.messages.pop_front().unwrap());
        }
    }

    /// Move every message whose timestamp is `<= max_timestamp` into
    /// `target`, in one rotation pass over the queue. Messages kept back
    /// stay in their relative order but end up behind any message appended
    /// while the pass was pending.
    pub fn take_older_than(&self, max_timestamp: u64, target: &mut Vec<Arc<Message>>) {
        let mut inner = self.inner.lock().unwrap();

        let size = inner.messages.len();
        for _ in 0..size {
            let message = inner.messages.pop_front().unwrap();
            if message.timestamp <= max_timestamp {
                target.push(message);
            } else {
                inner.messages.push_back(message);
            }
        }
    }

    /// Number of messages currently held.
    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().messages.len()
    }

    /// True when no message is held.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().messages.is_empty()
    }

    /// Buffer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Largest size ever observed.
    pub fn high_water_mark(&self) -> usize {
        self.inner.lock().unwrap().high_water_mark
    }

    /// Configured capacity.
    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use message::Message;
    use quickcheck::{QuickCheck, TestResult};
    use std::sync::Arc;

    fn msg(name: &str, value: f64, timestamp: u64) -> Arc<Message> {
        Arc::new(Message::new(name, value, timestamp))
    }

    #[test]
    fn take_respects_insertion_order() {
        let buffer = MessageBuffer::new("buffer name", 3, true);
        assert_eq!(buffer.name(), "buffer name");
        assert!(buffer.is_empty());

        assert!(buffer.add(msg("type.1", 0.0, 1)));
        assert!(buffer.add(msg("type.1", 1.0, 2)));
        assert_eq!(buffer.size(), 2);

        let mut messages = Vec::new();
        buffer.take(1, &mut messages);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].value, 0.0);
        assert_eq!(buffer.size(), 1);

        messages.clear();
        buffer.take(1, &mut messages);
        assert_eq!(messages[0].value, 1.0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn take_zero_means_all() {
        let buffer = MessageBuffer::new("t", 10, false);
        for i in 0..4 {
            buffer.add(msg("t", i as f64, i));
        }
        let mut messages = Vec::new();
        buffer.take(0, &mut messages);
        assert_eq!(messages.len(), 4);
        assert!(buffer.is_empty());
    }

    #[test]
    fn overflow_drop_new() {
        let buffer = MessageBuffer::new("test.3", 3, false);
        assert!(buffer.add(msg("test.3", 10.0, 40)));
        assert!(buffer.add(msg("test.3", 40.0, 60)));
        assert!(buffer.add(msg("test.3", 50.0, 70)));
        assert!(!buffer.add(msg("test.3", 99.0, 80)));
        assert_eq!(buffer.size(), 3);

        let mut messages = Vec::new();
        buffer.take(0, &mut messages);
        let values: Vec<f64> = messages.iter().map(|m| m.value).collect();
        assert_eq!(values, vec![10.0, 40.0, 50.0]);
    }

    #[test]
    fn overflow_drop_oldest() {
        let buffer = MessageBuffer::new("test.2", 3, true);
        assert!(buffer.add(msg("test.2", 10.0, 40)));
        assert!(buffer.add(msg("test.2", 40.0, 60)));
        assert!(buffer.add(msg("test.2", 50.0, 70)));
        assert!(buffer.add(msg("test.2", 99.0, 80)));
        assert_eq!(buffer.size(), 3);

        let mut messages = Vec::new();
        buffer.take(0, &mut messages);
        let values: Vec<f64> = messages.iter().map(|m| m.value).collect();
        assert_eq!(values, vec![40.0, 50.0, 99.0]);
    }

    #[test]
    fn take_older_than_rotates() {
        let buffer = MessageBuffer::new("type.1", 5, true);
        for timestamp in &[50, 10, 30, 20, 40] {
            buffer.add(msg("type.1", 0.0, *timestamp));
        }

        // nothing old enough
        let mut messages = Vec::new();
        buffer.take_older_than(0, &mut messages);
        assert!(messages.is_empty());
        assert_eq!(buffer.size(), 5);

        // two messages at or below the threshold
        buffer.take_older_than(20, &mut messages);
        let taken: Vec<u64> = messages.iter().map(|m| m.timestamp).collect();
        assert_eq!(taken, vec![10, 20]);
        assert_eq!(buffer.size(), 3);

        // survivors kept their relative order
        messages.clear();
        buffer.take_older_than(100, &mut messages);
        let taken: Vec<u64> = messages.iter().map(|m| m.timestamp).collect();
        assert_eq!(taken, vec![50, 30, 40]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn high_water_mark_is_monotonic() {
        let buffer = MessageBuffer::new("hwm", 10, false);
        buffer.add(msg("hwm", 0.0, 0));
        buffer.add(msg("hwm", 0.0, 0));
        buffer.add(msg("hwm", 0.0, 0));
        assert_eq!(buffer.high_water_mark(), 3);

        let mut messages = Vec::new();
        buffer.take(0, &mut messages);
        assert_eq!(buffer.high_water_mark(), 3);

        buffer.add(msg("hwm", 0.0, 0));
        assert_eq!(buffer.high_water_mark(), 3);
    }

    #[test]
    fn size_never_exceeds_capacity() {
        fn prop(values: Vec<u8>, max_size: usize, drop_oldest: bool) -> TestResult {
            if max_size == 0 || max_size > 64 {
                return TestResult::discard();
            }
            let buffer = MessageBuffer::new("prop", max_size, drop_oldest);
            for (i, value) in values.iter().enumerate() {
                buffer.add(msg("prop", f64::from(*value), i as u64));
                if buffer.size() > max_size {
                    return TestResult::failed();
                }
            }
            TestResult::from_bool(buffer.high_water_mark() <= max_size)
        }
        QuickCheck::new().quickcheck(prop as fn(Vec<u8>, usize, bool) -> TestResult);
    }
}
