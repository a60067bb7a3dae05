//! graphite-proxy is a buffering and aggregating proxy for Graphite
//! plain-text metrics. It sits between application instances and a Graphite
//! ingestion endpoint, smoothing bursty traffic through per-metric buffers,
//! rolling up configured metric families into windowed aggregates (sum,
//! average, min, max, median, variance, deviation, percentile-tiles) and
//! forwarding the resulting stream downstream over a single TCP connection.
//!
//! Why you might choose to run graphite-proxy:
//!
//!  * Your producers burst faster than your Graphite box ingests.
//!  * You want server-side roll-ups without touching the producers.
//!  * You want pending metrics to survive a clean restart.
//!
//! The proxy listens on TCP and UDP, classifies each incoming sample as
//! pass-through or aggregated, and flushes downstream on a timer. On
//! shutdown pending messages are written to disk and reloaded at the next
//! start.
#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]
extern crate chrono;
extern crate clap;
extern crate hostname;
extern crate regex;
extern crate toml;

#[macro_use]
extern crate log;

#[macro_use]
extern crate lazy_static;

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
extern crate tempdir;

pub mod buffer;
pub mod client;
pub mod config;
pub mod constants;
pub mod flusher;
pub mod maths;
pub mod message;
pub mod reaper;
pub mod router;
pub mod source;
pub mod state;
pub mod stats;
pub mod task;
pub mod time;
