//! A category pairs a metric-name filter with the computations to apply on
//! match.

use maths::computation::Computation;
use regex;
use regex::Regex;

/// The unit of aggregation configuration. Categories are evaluated in file
/// order and the first whose filter matches a metric name wins.
pub struct Category {
    filter: Regex,
    pattern: String,
    computations: Vec<Computation>,
}

impl Category {
    /// Compile the filter. The pattern must match the whole metric name, so
    /// it is anchored on both ends here.
    pub fn new(pattern: &str) -> Result<Category, regex::Error> {
        let filter = Regex::new(&format!("^(?:{})$", pattern))?;
        Ok(Category {
            filter: filter,
            pattern: pattern.to_string(),
            computations: Vec::new(),
        })
    }

    pub fn push(&mut self, computation: Computation) {
        self.computations.push(computation);
    }

    pub fn matches(&self, metric_name: &str) -> bool {
        self.filter.is_match(metric_name)
    }

    /// The filter as written in the rules file.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn computations(&self) -> &[Computation] {
        &self.computations
    }

    pub fn is_empty(&self) -> bool {
        self.computations.is_empty()
    }
}
