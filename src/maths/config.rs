//! Loading of the aggregation rules file.
//!
//! The file is TOML: an ordered array of `[[category]]` tables, each with a
//! `name` filter and an ordered array of `[[category.computation]]` tables.
//! A computation's `every` value decides its trigger: a plain integer fires
//! on message count, an `h`/`m`/`s` duration fires on time windows.

use maths::category::Category;
use maths::computation::{Computation, Kind};
use regex::Regex;
use time;
use toml;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const ATTRIBUTE_VALUE: &'static str = "value";
const ATTRIBUTE_BELOW: &'static str = "below";
const ATTRIBUTE_MULTIPLICATOR: &'static str = "multiplicator";
const ATTRIBUTE_DEFAULT_BELOW: &'static str = "true";
const ATTRIBUTE_DEFAULT_MULTIPLICATOR: &'static str = "100";

/// On-count thresholds at or below this value are rejected.
const COUNT_MIN_VALUE: u64 = 1;

lazy_static! {
    static ref REGEX_INTEGER: Regex = Regex::new("^[0-9]+$").unwrap();
    static ref REGEX_TIME: Regex =
        Regex::new("^([0-9]*[hH]*)([0-9]*[mM]*)([0-9]*[sS]*)$").unwrap();
}

/// Read and parse a rules file.
pub fn load(path: &Path) -> Result<Vec<Category>, String> {
    let mut file = File::open(path)
        .map_err(|e| format!("can't open aggregation rules file {}: {}", path.display(), e))?;
    let mut buffer = String::new();
    file.read_to_string(&mut buffer)
        .map_err(|e| format!("can't read aggregation rules file {}: {}", path.display(), e))?;
    parse(&buffer)
}

/// Parse rules out of a TOML document. An error means either broken syntax
/// or that no category survived the load rules.
pub fn parse(buffer: &str) -> Result<Vec<Category>, String> {
    let value: toml::Value =
        toml::from_str(buffer).map_err(|e| format!("can't parse aggregation rules: {}", e))?;

    let start = time::now();
    let mut categories = Vec::new();

    let nodes = match value.get("category").and_then(|node| node.as_array()) {
        Some(nodes) => nodes,
        None => return Err("no categories to load".to_string()),
    };

    for node in nodes {
        let pattern = match node.get("name").and_then(|name| name.as_str()) {
            Some(pattern) => pattern,
            None => {
                warn!("category without a name, ignored");
                continue;
            }
        };

        let mut category = match Category::new(pattern) {
            Ok(category) => category,
            Err(e) => {
                warn!("category '{}' has an unusable filter, ignored: {}", pattern, e);
                continue;
            }
        };
        debug!("loading category: {}", pattern);

        if let Some(computations) = node.get("computation").and_then(|list| list.as_array()) {
            for computation_node in computations {
                if let Some(computation) = parse_computation(computation_node, pattern, start) {
                    category.push(computation);
                }
            }
        }

        if category.is_empty() {
            warn!("category '{}' is empty, ignored", pattern);
        } else {
            categories.push(category);
        }
    }

    if categories.is_empty() {
        Err("no categories to load".to_string())
    } else {
        Ok(categories)
    }
}

fn parse_computation(node: &toml::Value, pattern: &str, start: u64) -> Option<Computation> {
    let kind_name = match node.get("kind").and_then(|kind| kind.as_str()) {
        Some(kind_name) => kind_name,
        None => {
            warn!("computation without a kind in category '{}', ignored", pattern);
            return None;
        }
    };
    let kind = match Kind::from_str(kind_name) {
        Some(kind) => kind,
        None => {
            warn!("unknown mathematical operation: {}", kind_name);
            return None;
        }
    };

    let every = match attribute(node, "every") {
        Some(every) => every,
        None => {
            warn!(
                "{} computation without an 'every' value in category '{}', ignored",
                kind_name, pattern
            );
            return None;
        }
    };

    let mut computation = if REGEX_INTEGER.is_match(&every) {
        let threshold = match every.parse::<u64>() {
            Ok(threshold) => threshold,
            Err(_) => return None,
        };
        if threshold <= COUNT_MIN_VALUE {
            warn!(
                "{} computation in category '{}' needs a count above {}, ignored",
                kind_name, pattern, COUNT_MIN_VALUE
            );
            return None;
        }
        Computation::on_count(kind, threshold)
    } else if REGEX_TIME.is_match(&every) {
        let threshold = time::parse_duration(&every);
        if threshold == 0 {
            warn!(
                "{} computation in category '{}' has an empty time window, ignored",
                kind_name, pattern
            );
            return None;
        }
        Computation::on_time(kind, threshold, start)
    } else {
        warn!(
            "{} computation in category '{}' has an unreadable 'every' value: {}",
            kind_name, pattern, every
        );
        return None;
    };

    if kind == Kind::Tiles {
        match attribute(node, ATTRIBUTE_VALUE) {
            Some(value) => {
                computation.set_option(ATTRIBUTE_VALUE, &value);
                let below =
                    attribute(node, ATTRIBUTE_BELOW).unwrap_or_else(|| ATTRIBUTE_DEFAULT_BELOW.to_string());
                computation.set_option(ATTRIBUTE_BELOW, &below);
                let multiplicator = attribute(node, ATTRIBUTE_MULTIPLICATOR)
                    .unwrap_or_else(|| ATTRIBUTE_DEFAULT_MULTIPLICATOR.to_string());
                computation.set_option(ATTRIBUTE_MULTIPLICATOR, &multiplicator);
            }
            None => {
                error!(
                    "tiles needs a '{}' attribute in category: {}",
                    ATTRIBUTE_VALUE, pattern
                );
                return None;
            }
        }
    }

    debug!("adding computation: {}", kind_name);
    Some(computation)
}

/// Fetch an attribute as text, tolerating bare TOML numbers and booleans.
fn attribute(node: &toml::Value, key: &str) -> Option<String> {
    match node.get(key) {
        Some(&toml::Value::String(ref text)) => Some(text.clone()),
        Some(&toml::Value::Integer(value)) => Some(value.to_string()),
        Some(&toml::Value::Float(value)) => Some(value.to_string()),
        Some(&toml::Value::Boolean(value)) => Some(value.to_string()),
        Some(_) | None => None,
    }
}
