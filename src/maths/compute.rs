//! The window computations themselves.
//!
//! Every function takes the window of messages collected by an operation
//! buffer and produces the message to forward, named after the first input
//! and stamped with the current time. Empty windows produce nothing.

use message::Message;
use time;
use std::cmp::Ordering;
use std::sync::Arc;

fn emit(messages: &[Arc<Message>], value: f64) -> Message {
    Message::new(&messages[0].name, value, time::now())
}

pub fn sum(messages: &[Arc<Message>]) -> Option<Message> {
    if messages.is_empty() {
        return None;
    }
    let total = messages.iter().fold(0.0, |acc, message| acc + message.value);
    Some(emit(messages, total))
}

pub fn average(messages: &[Arc<Message>]) -> Option<Message> {
    if messages.is_empty() {
        return None;
    }
    let total = messages.iter().fold(0.0, |acc, message| acc + message.value);
    Some(emit(messages, total / messages.len() as f64))
}

/// Population variance.
pub fn variance(messages: &[Arc<Message>]) -> Option<Message> {
    if messages.is_empty() {
        return None;
    }
    let size = messages.len() as f64;
    let mean = messages.iter().fold(0.0, |acc, message| acc + message.value) / size;
    let squared = messages.iter().fold(0.0, |acc, message| {
        let difference = message.value - mean;
        acc + difference * difference
    });
    Some(emit(messages, squared / size))
}

pub fn deviation(messages: &[Arc<Message>]) -> Option<Message> {
    variance(messages).map(|message| Message::new(&message.name, message.value.sqrt(), message.timestamp))
}

pub fn min(messages: &[Arc<Message>]) -> Option<Message> {
    if messages.is_empty() {
        return None;
    }
    let mut result = messages[0].value;
    for message in &messages[1..] {
        if message.value < result {
            result = message.value;
        }
    }
    Some(emit(messages, result))
}

pub fn max(messages: &[Arc<Message>]) -> Option<Message> {
    if messages.is_empty() {
        return None;
    }
    let mut result = messages[0].value;
    for message in &messages[1..] {
        if message.value > result {
            result = message.value;
        }
    }
    Some(emit(messages, result))
}

pub fn median(messages: &[Arc<Message>]) -> Option<Message> {
    if messages.is_empty() {
        return None;
    }

    let mut values: Vec<f64> = messages.iter().map(|message| message.value).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let size = values.len();
    let middle = size / 2;
    let value = if size % 2 != 0 {
        values[middle]
    } else {
        (values[middle] + values[middle - 1]) / 2.0
    };

    Some(emit(messages, value))
}

/// Share of the window below `value`, scaled by `multiplicator`.
///
/// With `strictly_below` unset, samples equal to `value` count for half.
pub fn tiles(
    messages: &[Arc<Message>],
    value: f64,
    strictly_below: bool,
    multiplicator: f64,
) -> Option<Message> {
    if messages.is_empty() {
        return None;
    }

    let mut nbr_below = 0;
    let mut nbr_equal = 0;
    for message in messages {
        if message.value < value {
            nbr_below += 1;
        } else if !strictly_below && message.value == value {
            nbr_equal += 1;
        }
    }

    let size = messages.len() as f64;
    let result = ((nbr_below as f64 + 0.5 * nbr_equal as f64) / size) * multiplicator;

    Some(emit(messages, result))
}
