//! On-demand dump of the process state into a human-readable file,
//! triggered by a signal. Handy when a proxy in production behaves oddly
//! and restarting it would destroy the evidence.

use buffer::GlobalBuffer;
use maths::Pipeline;
use time;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub struct CurrentState {
    global: Arc<GlobalBuffer>,
    pipeline: Option<Arc<Pipeline>>,
    client_endpoint: String,
    flush_period: u64,
}

impl CurrentState {
    pub fn new(
        global: Arc<GlobalBuffer>,
        pipeline: Option<Arc<Pipeline>>,
        client_endpoint: String,
        flush_period: u64,
    ) -> CurrentState {
        CurrentState {
            global: global,
            pipeline: pipeline,
            client_endpoint: client_endpoint,
            flush_period: flush_period,
        }
    }

    fn report(&self) -> String {
        let mut report = String::new();
        report.push_str(&format!("graphite-proxy state at {}\n", time::now()));
        report.push_str(&format!("client: {}\n", self.client_endpoint));
        report.push_str(&format!("flush period: {}s\n", self.flush_period));
        report.push_str(&format!(
            "global buffer: max_size={} drop_oldest={} hwm={}\n",
            self.global.buffer_max_size(),
            self.global.drop_oldest(),
            self.global.high_water_mark()
        ));
        for (name, size) in self.global.buffer_sizes() {
            report.push_str(&format!("  buffer '{}': {} messages\n", name, size));
        }
        match self.pipeline {
            Some(ref pipeline) => {
                report.push_str(&format!(
                    "aggregation: {} metrics, valid={} hwm={}\n",
                    pipeline.buffer_count(),
                    pipeline.is_valid(),
                    pipeline.high_water_mark()
                ));
                for (name, size) in pipeline.buffer_sizes() {
                    report.push_str(&format!("  operation '{}': {} messages\n", name, size));
                }
            }
            None => report.push_str("aggregation: disabled\n"),
        }
        report
    }

    /// Write the report. The returned string is meant to be logged.
    pub fn save(&self, path: &Path) -> String {
        let report = self.report();
        match File::create(path).and_then(|mut file| file.write_all(report.as_bytes())) {
            Ok(()) => format!("current state saved into {}", path.display()),
            Err(e) => format!("can't save current state into {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client::mock::Recorder;
    use message::Message;
    use tempdir::TempDir;
    use std::fs;

    #[test]
    fn save_writes_a_report() {
        let dir = TempDir::new("state").unwrap();
        let client = Arc::new(Recorder::new(true));
        let global = Arc::new(GlobalBuffer::new(10, true, client));
        global.add(Arc::new(Message::new("seen.metric", 1.0, 1)));

        let state = CurrentState::new(global, None, "localhost:2003".to_string(), 5);
        let path = dir.path().join("current_state.gp");
        let outcome = state.save(&path);
        assert!(outcome.contains("saved"));

        let report = fs::read_to_string(&path).unwrap();
        assert!(report.contains("client: localhost:2003"));
        assert!(report.contains("buffer 'seen.metric': 1 messages"));
        assert!(report.contains("aggregation: disabled"));
    }
}
