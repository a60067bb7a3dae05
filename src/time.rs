//! Collection of time utilities for graphite-proxy.
//!
//! All timestamps handled by the proxy are seconds since the epoch, UTC.

use chrono::offset::Utc;

/// Return the current time in epoch seconds.
pub fn now() -> u64 {
    Utc::now().timestamp() as u64
}

/// Parse a duration sentence like `3h27m21s` into seconds.
///
/// Segments may appear in any order and unit letters are case-insensitive:
/// `21S3H27M` parses the same as `3h27m21s`. Digits not followed by a unit
/// letter are ignored, and an unparsable segment counts as zero.
pub fn parse_duration(sentence: &str) -> u64 {
    let mut total = 0;
    let mut buffer = String::new();

    for character in sentence.chars() {
        match character {
            'h' | 'H' => {
                total += parse_segment(&buffer) * 3600;
                buffer.clear();
            }
            'm' | 'M' => {
                total += parse_segment(&buffer) * 60;
                buffer.clear();
            }
            's' | 'S' => {
                total += parse_segment(&buffer);
                buffer.clear();
            }
            _ => buffer.push(character),
        }
    }

    total
}

fn parse_segment(buffer: &str) -> u64 {
    match buffer.parse::<u64>() {
        Ok(value) => value,
        Err(_) => {
            if !buffer.is_empty() {
                warn!("can't parse duration segment: {:?}", buffer);
            }
            0
        }
    }
}
