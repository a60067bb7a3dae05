//! The Graphite plain-text message model.
//!
//! A message is the parsed form of one `<name> <value> <timestamp>` line.
//! Messages are immutable once built and are shared between buffers, the
//! aggregation pipeline and the downstream client as `Arc<Message>`.

use time;

/// One metric sample.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// Metric identifier. A message with an empty name is invalid.
    pub name: String,
    /// Sample value.
    pub value: f64,
    /// Producer-supplied timestamp, epoch seconds.
    pub timestamp: u64,
    /// Proxy-local arrival instant, epoch seconds.
    pub received_at: u64,
}

impl Message {
    /// Build a message stamped with the current receive time.
    pub fn new(name: &str, value: f64, timestamp: u64) -> Message {
        Message {
            name: name.to_string(),
            value: value,
            timestamp: timestamp,
            received_at: time::now(),
        }
    }

    /// Parse a single line into a message.
    ///
    /// The line is trimmed then split on spaces; it must yield exactly three
    /// non-empty tokens whose numeric fields parse. Anything else is `None`.
    pub fn parse_line(input: &str) -> Option<Message> {
        let trimmed = input.trim();
        let parts: Vec<&str> = trimmed.split(' ').collect();

        if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
            return None;
        }

        let value = match parts[1].parse::<f64>() {
            Ok(value) => value,
            Err(_) => return None,
        };
        let timestamp = match parts[2].parse::<u64>() {
            Ok(timestamp) => timestamp,
            Err(_) => return None,
        };

        Some(Message::new(parts[0], value, timestamp))
    }

    /// Parse a newline-separated payload, collecting every line that parses
    /// into `target`. Returns true when at least one message was collected.
    pub fn parse_lines(input: &str, target: &mut Vec<Message>) -> bool {
        for line in input.split('\n') {
            if let Some(message) = Message::parse_line(line) {
                target.push(message);
            }
        }
        !target.is_empty()
    }

    /// The canonical textual form expected by Graphite, with the value
    /// printed to six decimal places so a serialize/parse round trip is
    /// lossless at that precision.
    pub fn serialize(&self) -> String {
        format!("{} {:.6} {}", self.name, self.value, self.timestamp)
    }

    /// Byte length of the serialization.
    pub fn length(&self) -> usize {
        self.serialize().len()
    }

    /// A message is valid iff its name is non-empty.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }
}
