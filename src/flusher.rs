//! The periodic link between the global buffer and the downstream client.

use buffer::GlobalBuffer;
use client::Client;
use task::Task;
use std::sync::Arc;

/// Each tick drains the whole global buffer and offers the batch to the
/// client; a refused batch is put back and retried next tick.
pub struct Flusher {
    buffer: Arc<GlobalBuffer>,
    client: Arc<dyn Client>,
}

impl Flusher {
    pub fn new(buffer: Arc<GlobalBuffer>, client: Arc<dyn Client>) -> Flusher {
        Flusher {
            buffer: buffer,
            client: client,
        }
    }
}

impl Task for Flusher {
    fn name(&self) -> &'static str {
        "flusher"
    }

    fn tick(&mut self) {
        let mut pending = Vec::new();
        self.buffer.take_all(&mut pending);

        if pending.is_empty() {
            return;
        }
        debug!("{} messages to send", pending.len());

        if !self.client.send(&pending) {
            for message in pending {
                self.buffer.add(message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client::mock::Recorder;
    use message::Message;
    use std::sync::Arc;

    fn msg(name: &str, value: f64) -> Arc<Message> {
        Arc::new(Message::new(name, value, 1))
    }

    #[test]
    fn tick_drains_to_the_client() {
        let client = Arc::new(Recorder::new(false));
        let buffer = Arc::new(GlobalBuffer::new(100, true, client.clone()));
        buffer.add(msg("a", 1.0));
        buffer.add(msg("b", 2.0));

        let mut flusher = Flusher::new(buffer.clone(), client.clone());
        flusher.tick();

        assert_eq!(client.sent_total(), 2);
        let mut leftovers = Vec::new();
        buffer.take_all(&mut leftovers);
        assert!(leftovers.is_empty());
    }

    #[test]
    fn refused_batch_is_requeued() {
        let client = Arc::new(Recorder::new(true));
        let buffer = Arc::new(GlobalBuffer::new(100, true, client.clone()));
        buffer.add(msg("a", 1.0));

        let mut flusher = Flusher::new(buffer.clone(), client.clone());
        flusher.tick();

        let mut leftovers = Vec::new();
        buffer.take_all(&mut leftovers);
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn empty_buffer_skips_the_client() {
        let client = Arc::new(Recorder::new(false));
        let buffer = Arc::new(GlobalBuffer::new(100, true, client.clone()));

        let mut flusher = Flusher::new(buffer, client.clone());
        flusher.tick();

        assert!(client.batches().is_empty());
    }
}
