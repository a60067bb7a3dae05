//! A computation describes one configured aggregation: what to compute and
//! when to fire.

use std::collections::BTreeMap;

/// The mathematical operation applied to a window of values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Sum,
    Average,
    Min,
    Max,
    Median,
    Tiles,
    Variance,
    Deviation,
}

impl Kind {
    /// The wire name, used both in the rules file and as the fourth token of
    /// the persistence format.
    pub fn as_str(&self) -> &'static str {
        match *self {
            Kind::Sum => "sum",
            Kind::Average => "average",
            Kind::Min => "min",
            Kind::Max => "max",
            Kind::Median => "median",
            Kind::Tiles => "tiles",
            Kind::Variance => "variance",
            Kind::Deviation => "deviation",
        }
    }

    /// Parse a wire name, case-insensitively.
    pub fn from_str(input: &str) -> Option<Kind> {
        match input.to_lowercase().as_str() {
            "sum" => Some(Kind::Sum),
            "average" => Some(Kind::Average),
            "min" => Some(Kind::Min),
            "max" => Some(Kind::Max),
            "median" => Some(Kind::Median),
            "tiles" => Some(Kind::Tiles),
            "variance" => Some(Kind::Variance),
            "deviation" => Some(Kind::Deviation),
            _ => None,
        }
    }
}

/// What makes a computation fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// Fire as soon as the buffer holds `threshold` messages.
    OnCount,
    /// Fire every `threshold` seconds, window-aligned.
    OnTime,
}

/// One configured aggregation.
#[derive(Clone, Debug)]
pub struct Computation {
    kind: Kind,
    trigger: Trigger,
    threshold: u64,
    last_fired_at: u64,
    options: BTreeMap<String, String>,
}

impl Computation {
    /// A count-triggered computation.
    pub fn on_count(kind: Kind, threshold: u64) -> Computation {
        Computation {
            kind: kind,
            trigger: Trigger::OnCount,
            threshold: threshold,
            last_fired_at: 0,
            options: BTreeMap::new(),
        }
    }

    /// A time-triggered computation whose first window closes `threshold`
    /// seconds after `start`.
    pub fn on_time(kind: Kind, threshold: u64, start: u64) -> Computation {
        Computation {
            kind: kind,
            trigger: Trigger::OnTime,
            threshold: threshold,
            last_fired_at: start,
            options: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    /// Messages for on-count computations, seconds for on-time ones.
    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Only meaningful for on-time computations.
    pub fn last_fired_at(&self) -> u64 {
        self.last_fired_at
    }

    /// Instant the current window closes.
    pub fn next_fire_time(&self) -> u64 {
        self.last_fired_at + self.threshold
    }

    /// Move to the next window after a computed one.
    pub fn advance(&mut self) {
        self.last_fired_at += self.threshold;
    }

    /// Re-align the window to `now` after a stretch without messages.
    pub fn reset(&mut self, now: u64) {
        self.last_fired_at = now;
    }

    /// Attach an option, such as the tiles `value`.
    pub fn set_option(&mut self, name: &str, value: &str) {
        self.options.insert(name.to_string(), value.to_string());
    }

    /// Look an option up.
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(|value| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_computation() {
        let computation = Computation::on_count(Kind::Sum, 100);
        assert_eq!(computation.trigger(), Trigger::OnCount);
        assert_eq!(computation.kind(), Kind::Sum);
        assert_eq!(computation.threshold(), 100);
        assert_eq!(computation.last_fired_at(), 0);
    }

    #[test]
    fn time_computation_windows() {
        let mut computation = Computation::on_time(Kind::Average, 100, 1);
        assert_eq!(computation.trigger(), Trigger::OnTime);
        assert_eq!(computation.threshold(), 100);
        assert_eq!(computation.last_fired_at(), 1);
        assert_eq!(computation.next_fire_time(), 101);

        computation.advance();
        assert_eq!(computation.next_fire_time(), 201);

        computation.reset(500);
        assert_eq!(computation.next_fire_time(), 600);
    }

    #[test]
    fn kind_wire_names_round_trip() {
        let kinds = [
            Kind::Sum,
            Kind::Average,
            Kind::Min,
            Kind::Max,
            Kind::Median,
            Kind::Tiles,
            Kind::Variance,
            Kind::Deviation,
        ];
        for kind in &kinds {
            assert_eq!(Kind::from_str(kind.as_str()), Some(*kind));
        }
        assert_eq!(Kind::from_str("SUM"), Some(Kind::Sum));
        assert_eq!(Kind::from_str("nope"), None);
    }

    #[test]
    fn options() {
        let mut computation = Computation::on_count(Kind::Tiles, 10);
        assert_eq!(computation.option("value"), None);
        computation.set_option("value", "6.4");
        assert_eq!(computation.option("value"), Some("6.4"));
    }
}
