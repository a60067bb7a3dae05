//! The aggregation pipeline.
//!
//! The pipeline is a second ingress next to the global buffer: messages
//! whose name matches a configured category are held in per-operation
//! buffers until their computation fires, and the computed result is handed
//! back to the global buffer where it travels like any pass-through
//! message.

use buffer::{GlobalBuffer, MessageBuffer};
use message::Message;
use stats;
use stats::Registry;
use task::Task;
use time;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub mod category;
pub mod computation;
pub mod compute;
pub mod config;

pub use self::category::Category;
pub use self::computation::{Computation, Kind, Trigger};

/// A computation paired with the buffer feeding it.
pub struct Operation {
    computation: Computation,
    buffer: MessageBuffer,
}

struct Inner {
    categories: Vec<Category>,
    operations: BTreeMap<String, Vec<Operation>>,
    valid: bool,
}

/// Holds the configured categories and, per accepted metric, one operation
/// per computation of its matching category.
///
/// All pipeline state sits behind one mutex. The pipeline calls into the
/// global buffer while holding it; the global buffer never calls back, so
/// the lock order has a single direction.
pub struct Pipeline {
    global: Arc<GlobalBuffer>,
    stats: Arc<Registry>,
    buffer_max_size: usize,
    inner: Mutex<Inner>,
}

impl Pipeline {
    /// Load the rules file and build the pipeline. A file that can not be
    /// loaded leaves the pipeline invalid: `add` refuses everything.
    pub fn new(
        rules_path: &Path,
        global: Arc<GlobalBuffer>,
        buffer_max_size: usize,
        stats: Arc<Registry>,
    ) -> Pipeline {
        let (categories, valid) = match config::load(rules_path) {
            Ok(categories) => (categories, true),
            Err(e) => {
                error!("aggregation configuration can't be loaded: {}", e);
                (Vec::new(), false)
            }
        };

        Pipeline {
            global: global,
            stats: stats,
            buffer_max_size: buffer_max_size,
            inner: Mutex::new(Inner {
                categories: categories,
                operations: BTreeMap::new(),
                valid: valid,
            }),
        }
    }

    /// True when a usable category list is installed.
    pub fn is_valid(&self) -> bool {
        self.inner.lock().unwrap().valid
    }

    /// Swap in a freshly parsed category list. A file that fails to load
    /// keeps the previous rules in place. Existing operations are left
    /// untouched either way: orphans keep draining and the reaper collects
    /// them once empty.
    pub fn reload(&self, rules_path: &Path) -> bool {
        debug!("reloading aggregation rules from {}", rules_path.display());
        match config::load(rules_path) {
            Ok(categories) => {
                let mut inner = self.inner.lock().unwrap();
                inner.categories = categories;
                inner.valid = true;
                true
            }
            Err(e) => {
                error!("aggregation rules reload failed, keeping previous rules: {}", e);
                false
            }
        }
    }

    fn match_category<'a>(categories: &'a [Category], metric_name: &str) -> Option<&'a Category> {
        categories.iter().find(|category| category.matches(metric_name))
    }

    /// Does any category want this metric? First match in file order wins.
    pub fn is_wanted(&self, metric_name: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        Pipeline::match_category(&inner.categories, metric_name).is_some()
    }

    /// Store a message into every operation of its matching category.
    pub fn add(&self, message: &Arc<Message>) -> bool {
        self.add_filtered(message, None)
    }

    /// Store a message, restricted to the operation of one computation kind
    /// when `filter` is set. Persistence restore uses the filter to put each
    /// saved message back into the single operation it came from.
    pub fn add_filtered(&self, message: &Arc<Message>, filter: Option<Kind>) -> bool {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        if !inner.valid {
            error!("invalid aggregation configuration, can't accept any message");
            return false;
        }
        if !message.is_valid() {
            warn!("invalid message: {}", message.serialize());
            return false;
        }

        let category = match Pipeline::match_category(&inner.categories, &message.name) {
            Some(category) => category,
            None => {
                debug!("message not accepted by any category: {}", message.name);
                return false;
            }
        };

        let buffer_max_size = self.buffer_max_size;
        let operations = inner
            .operations
            .entry(message.name.clone())
            .or_insert_with(|| {
                category
                    .computations()
                    .iter()
                    .map(|computation| {
                        let buffer_name =
                            format!("{} {}", message.name, computation.kind().as_str());
                        debug!("creating aggregation operation: {}", buffer_name);
                        Operation {
                            computation: computation.clone(),
                            buffer: MessageBuffer::new(&buffer_name, buffer_max_size, false),
                        }
                    })
                    .collect()
            });

        match filter {
            None => {
                for operation in operations.iter() {
                    debug!("add message to operation buffer: {}", operation.buffer.name());
                    operation.buffer.add(message.clone());
                }
            }
            Some(kind) => {
                for operation in operations.iter() {
                    if operation.computation.kind() == kind {
                        operation.buffer.add(message.clone());
                        break;
                    }
                }
            }
        }

        true
    }

    /// Run every due computation, emitting results into the global buffer.
    pub fn tick(&self, now: u64) {
        debug!("starting new aggregation iteration");
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        for (metric_name, operations) in inner.operations.iter_mut() {
            for operation in operations.iter_mut() {
                match operation.computation.trigger() {
                    Trigger::OnCount => {
                        let threshold = operation.computation.threshold() as usize;
                        if operation.buffer.size() >= threshold {
                            let mut window = Vec::new();
                            operation.buffer.take(threshold, &mut window);
                            debug!(
                                "{} => firing on {} messages",
                                operation.buffer.name(),
                                window.len()
                            );
                            self.fire(&operation.computation, &window);
                        } else {
                            debug!(
                                "{} => not ready, need {} <= {}",
                                metric_name,
                                operation.computation.threshold(),
                                operation.buffer.size()
                            );
                        }
                    }
                    Trigger::OnTime => {
                        while now >= operation.computation.next_fire_time() {
                            let mut window = Vec::new();
                            operation
                                .buffer
                                .take_older_than(operation.computation.next_fire_time(), &mut window);

                            if window.is_empty() {
                                // no back-fill after producer silence: the
                                // window re-aligns to real time
                                debug!(
                                    "{} => no messages old enough to compute",
                                    operation.buffer.name()
                                );
                                operation.computation.reset(now);
                                break;
                            }

                            debug!(
                                "{} => firing on {} messages",
                                operation.buffer.name(),
                                window.len()
                            );
                            self.fire(&operation.computation, &window);
                            operation.computation.advance();
                        }
                    }
                }
            }
        }
    }

    fn fire(&self, computation: &Computation, window: &[Arc<Message>]) {
        if window.is_empty() {
            return;
        }

        let result = match computation.kind() {
            Kind::Sum => {
                self.stats.raise(stats::MATHS_SUM, 1);
                compute::sum(window)
            }
            Kind::Average => {
                self.stats.raise(stats::MATHS_AVERAGE, 1);
                compute::average(window)
            }
            Kind::Min => {
                self.stats.raise(stats::MATHS_MIN, 1);
                compute::min(window)
            }
            Kind::Max => {
                self.stats.raise(stats::MATHS_MAX, 1);
                compute::max(window)
            }
            Kind::Median => {
                self.stats.raise(stats::MATHS_MEDIAN, 1);
                compute::median(window)
            }
            Kind::Variance => {
                self.stats.raise(stats::MATHS_VARIANCE, 1);
                compute::variance(window)
            }
            Kind::Deviation => {
                self.stats.raise(stats::MATHS_DEVIATION, 1);
                compute::deviation(window)
            }
            Kind::Tiles => {
                self.stats.raise(stats::MATHS_TILES, 1);
                match tiles_options(computation) {
                    Some((value, strictly_below, multiplicator)) => {
                        compute::tiles(window, value, strictly_below, multiplicator)
                    }
                    None => None,
                }
            }
        };

        if let Some(result) = result {
            self.stats.raise(stats::MATHS_MESSAGES, 1);
            self.global.add(Arc::new(result));
        }
    }

    /// Drain every operation buffer into `target`.
    pub fn take_all(&self, target: &mut Vec<Arc<Message>>) {
        let inner = self.inner.lock().unwrap();
        for operations in inner.operations.values() {
            for operation in operations.iter() {
                operation.buffer.take(0, target);
            }
        }
    }

    /// Drain every operation buffer, tagging each message with the kind of
    /// the computation it was waiting for. Used by persistence.
    pub fn take_all_with_kinds(&self, target: &mut Vec<(Arc<Message>, Kind)>) {
        let inner = self.inner.lock().unwrap();
        for operations in inner.operations.values() {
            for operation in operations.iter() {
                let mut drained = Vec::new();
                operation.buffer.take(0, &mut drained);
                let kind = operation.computation.kind();
                for message in drained {
                    target.push((message, kind));
                }
            }
        }
    }

    /// Snapshot of every operation buffer name and its current size.
    pub fn buffer_sizes(&self) -> Vec<(String, usize)> {
        let inner = self.inner.lock().unwrap();
        let mut sizes = Vec::new();
        for operations in inner.operations.values() {
            for operation in operations.iter() {
                sizes.push((operation.buffer.name().to_string(), operation.buffer.size()));
            }
        }
        sizes
    }

    /// Number of metrics currently holding operations.
    pub fn buffer_count(&self) -> usize {
        self.inner.lock().unwrap().operations.len()
    }

    /// Largest high water mark across the operation buffers.
    pub fn high_water_mark(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .operations
            .values()
            .flat_map(|operations| operations.iter())
            .map(|operation| operation.buffer.high_water_mark())
            .max()
            .unwrap_or(0)
    }

    /// Remove the single operation owning the buffer called `buffer_name`;
    /// a metric left with no operations loses its map entry. Called by the
    /// reaper.
    pub fn remove(&self, buffer_name: &str) {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        let mut emptied = None;
        for (metric_name, operations) in inner.operations.iter_mut() {
            let found = operations
                .iter()
                .position(|operation| operation.buffer.name() == buffer_name);
            if let Some(index) = found {
                operations.remove(index);
                if operations.is_empty() {
                    emptied = Some(metric_name.clone());
                }
                break;
            }
        }

        if let Some(metric_name) = emptied {
            inner.operations.remove(&metric_name);
        }
    }
}

fn tiles_options(computation: &Computation) -> Option<(f64, bool, f64)> {
    let value = match computation.option("value").map(|raw| raw.parse::<f64>()) {
        Some(Ok(value)) => value,
        _ => {
            error!("tiles computation is missing a readable 'value' option");
            return None;
        }
    };
    let below = match computation.option("below").unwrap_or("true") {
        "true" | "1" => true,
        "false" | "0" => false,
        other => {
            error!("tiles computation has an unreadable 'below' option: {}", other);
            return None;
        }
    };
    let multiplicator = match computation
        .option("multiplicator")
        .unwrap_or("100")
        .parse::<f64>()
    {
        Ok(multiplicator) => multiplicator,
        Err(_) => {
            error!("tiles computation has an unreadable 'multiplicator' option");
            return None;
        }
    };
    Some((value, below, multiplicator))
}

/// Periodic task driving the pipeline's window computations.
pub struct Ticker {
    pipeline: Arc<Pipeline>,
}

impl Ticker {
    pub fn new(pipeline: Arc<Pipeline>) -> Ticker {
        Ticker { pipeline: pipeline }
    }
}

impl Task for Ticker {
    fn name(&self) -> &'static str {
        "maths"
    }

    fn tick(&mut self) {
        self.pipeline.tick(time::now());
    }
}
