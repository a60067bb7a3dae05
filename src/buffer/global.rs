//! The global buffer: one message buffer per metric name, plus the
//! full-buffer drain path toward the downstream client.

use buffer::MessageBuffer;
use client::Client;
use message::Message;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Ingress point for pass-through traffic.
///
/// Child buffers are created lazily, one per metric name, all sharing the
/// same capacity and drop policy. When an insertion fills a child buffer it
/// is drained and the batch offered to the client at once; a refused batch
/// goes straight back into the same child.
pub struct GlobalBuffer {
    buffer_max_size: usize,
    drop_oldest: bool,
    client: Arc<dyn Client>,
    buffers: Mutex<BTreeMap<String, Arc<MessageBuffer>>>,
}

impl GlobalBuffer {
    pub fn new(buffer_max_size: usize, drop_oldest: bool, client: Arc<dyn Client>) -> GlobalBuffer {
        debug!("max buffer size: {}", buffer_max_size);
        debug!("dropping oldest: {}", drop_oldest);
        GlobalBuffer {
            buffer_max_size: buffer_max_size,
            drop_oldest: drop_oldest,
            client: client,
            buffers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Store a message under its metric name. Returns false for invalid
    /// messages and for messages refused by a full child buffer.
    pub fn add(&self, message: Arc<Message>) -> bool {
        if !message.is_valid() {
            warn!("invalid message: {}", message.serialize());
            return false;
        }

        let buffer = {
            let mut buffers = self.buffers.lock().unwrap();
            buffers
                .entry(message.name.clone())
                .or_insert_with(|| {
                    Arc::new(MessageBuffer::new(
                        &message.name,
                        self.buffer_max_size,
                        self.drop_oldest,
                    ))
                })
                .clone()
        };

        let serialized = message.serialize();

        if !buffer.add(message) {
            debug!("message dropped: {}", serialized);
            return false;
        }
        debug!("message added: {}", serialized);

        if buffer.size() >= self.buffer_max_size {
            debug!("buffer '{}' is full, sending messages", buffer.name());

            let mut pending = Vec::new();
            buffer.take(0, &mut pending);

            if !self.client.send(&pending) {
                // refused batch goes back where it came from
                for message in pending {
                    buffer.add(message);
                }
            }
        }

        true
    }

    /// Drain every child buffer into `target`.
    pub fn take_all(&self, target: &mut Vec<Arc<Message>>) {
        let buffers = self.buffers.lock().unwrap();
        for buffer in buffers.values() {
            buffer.take(0, target);
        }
    }

    /// Drain the buffer named `name`, when it exists. The map lock is
    /// released before the child is drained.
    pub fn take_by_name(&self, name: &str, target: &mut Vec<Arc<Message>>) {
        let buffer = {
            let buffers = self.buffers.lock().unwrap();
            match buffers.get(name) {
                Some(buffer) => buffer.clone(),
                None => return,
            }
        };
        buffer.take(0, target);
    }

    /// Snapshot of every buffer name and its current size.
    pub fn buffer_sizes(&self) -> BTreeMap<String, usize> {
        let buffers = self.buffers.lock().unwrap();
        buffers
            .iter()
            .map(|(name, buffer)| (name.clone(), buffer.size()))
            .collect()
    }

    /// Largest high water mark across the child buffers.
    pub fn high_water_mark(&self) -> usize {
        let buffers = self.buffers.lock().unwrap();
        buffers
            .values()
            .map(|buffer| buffer.high_water_mark())
            .max()
            .unwrap_or(0)
    }

    /// Per-child capacity.
    pub fn buffer_max_size(&self) -> usize {
        self.buffer_max_size
    }

    /// The full-buffer policy applied to every child.
    pub fn drop_oldest(&self) -> bool {
        self.drop_oldest
    }

    /// Delete a child buffer outright. Called by the reaper.
    pub fn remove(&self, buffer_name: &str) {
        let mut buffers = self.buffers.lock().unwrap();
        buffers.remove(buffer_name);
    }
}
