//! Internal statistics: a counter registry plus the periodic task that
//! reports it as regular metrics through the router.

use buffer::GlobalBuffer;
use hostname;
use maths::Pipeline;
use message::Message;
use router::Router;
use task::Task;
use time;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

// Request statistics
pub const REQUESTS_INCOMING: &'static str = "requests.incoming.nbr";
pub const REQUESTS_ACCEPTED: &'static str = "requests.accepted.nbr";
pub const REQUESTS_DROPPED: &'static str = "requests.dropped.nbr";
pub const REQUESTS_SEND: &'static str = "requests.send.nbr";
/// Number of metric messages shipped inside client batches.
pub const REQUESTS_SEND_CONTENT: &'static str = "requests.send.content";

// Aggregation computations
pub const MATHS_MESSAGES: &'static str = "maths.messages.created.nbr";
pub const MATHS_SUM: &'static str = "maths.operations.sum";
pub const MATHS_AVERAGE: &'static str = "maths.operations.average";
pub const MATHS_VARIANCE: &'static str = "maths.operations.variance";
pub const MATHS_DEVIATION: &'static str = "maths.operations.deviation";
pub const MATHS_MIN: &'static str = "maths.operations.min";
pub const MATHS_MAX: &'static str = "maths.operations.max";
pub const MATHS_MEDIAN: &'static str = "maths.operations.median";
pub const MATHS_TILES: &'static str = "maths.operations.tiles";

// Statistics of statistics
pub const STATS_MESSAGES: &'static str = "statistics.messages.created.nbr";

// Buffers
pub const GLOBAL_BUFFER_MESSAGES_MAX: &'static str = "global_buffer.messages.max";
pub const MATH_BUFFER_MESSAGES_MAX: &'static str = "math_buffer.messages.max";

// Client
pub const CLIENT_CONNECTION_FAILED: &'static str = "client.connection.failed.nbr";

// Message
pub const MESSAGES_CREATED: &'static str = "messages.created.nbr";

/// Mutex-guarded accumulator map. One registry is built at startup and
/// handed to every component that counts something.
pub struct Registry {
    metrics: Mutex<BTreeMap<String, i64>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            metrics: Mutex::new(BTreeMap::new()),
        }
    }

    /// Add `value` to a metric, creating it when absent. Negative deltas are
    /// allowed.
    pub fn raise(&self, metric: &str, value: i64) {
        let mut metrics = self.metrics.lock().unwrap();
        *metrics.entry(metric.to_string()).or_insert(0) += value;
    }

    /// Overwrite a metric with a gauge reading.
    pub fn set(&self, metric: &str, value: i64) {
        let mut metrics = self.metrics.lock().unwrap();
        metrics.insert(metric.to_string(), value);
    }

    /// Copy of the current accumulators.
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        self.metrics.lock().unwrap().clone()
    }

    /// Number of tracked metrics.
    pub fn len(&self) -> usize {
        self.metrics.lock().unwrap().len()
    }

    /// Drop every accumulator.
    pub fn clear(&self) {
        self.metrics.lock().unwrap().clear();
    }
}

/// Periodic task turning the registry and a few buffer gauges into
/// `graphite_proxy.<host>.stats.*` messages.
///
/// The messages are routed like any other traffic, so they are subject to
/// the aggregation categories and the usual buffering policy.
pub struct Collector {
    registry: Arc<Registry>,
    global: Arc<GlobalBuffer>,
    pipeline: Option<Arc<Pipeline>>,
    router: Arc<Router>,
    prefix: String,
}

impl Collector {
    pub fn new(
        registry: Arc<Registry>,
        global: Arc<GlobalBuffer>,
        pipeline: Option<Arc<Pipeline>>,
        router: Arc<Router>,
    ) -> Collector {
        let host = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        Collector {
            registry: registry,
            global: global,
            pipeline: pipeline,
            router: router,
            prefix: format!("graphite_proxy.{}.stats.", host),
        }
    }
}

impl Task for Collector {
    fn name(&self) -> &'static str {
        "stats"
    }

    fn tick(&mut self) {
        debug!("statistics iteration");
        let timestamp = time::now();

        let global_max = self.global.high_water_mark();
        let maths_max = match self.pipeline {
            Some(ref pipeline) => pipeline.high_water_mark(),
            None => 0,
        };

        self.registry.set(GLOBAL_BUFFER_MESSAGES_MAX, global_max as i64);
        self.registry.set(MATH_BUFFER_MESSAGES_MAX, maths_max as i64);
        self.registry.set(STATS_MESSAGES, self.registry.len() as i64 + 1);

        for (metric, value) in self.registry.snapshot() {
            let name = format!("{}{}", self.prefix, metric);
            let message = Message::new(&name, value as f64, timestamp);
            self.router.route(Arc::new(message));
        }

        self.registry.clear();
    }
}
