//! The reaper removes buffers that stay empty for too many consecutive
//! cycles, keeping the buffer maps from accumulating dead metrics.

use buffer::GlobalBuffer;
use maths::Pipeline;
use task::Task;
use std::collections::HashMap;
use std::sync::Arc;

/// Streaks shorter than this never remove anything; a configured value
/// below it is clamped up.
const MIN_EMPTY_CYCLES: u32 = 2;

/// Tracks, per buffer, how many consecutive ticks it was observed empty.
/// Streak keys are namespaced so global-buffer and aggregation buffers with
/// the same name can not collide.
pub struct Reaper {
    global: Arc<GlobalBuffer>,
    pipeline: Option<Arc<Pipeline>>,
    max_empty_cycles: u32,
    streaks: HashMap<String, u32>,
}

impl Reaper {
    pub fn new(
        global: Arc<GlobalBuffer>,
        pipeline: Option<Arc<Pipeline>>,
        max_empty_cycles: u32,
    ) -> Reaper {
        let max_empty_cycles = if max_empty_cycles > MIN_EMPTY_CYCLES {
            max_empty_cycles
        } else {
            MIN_EMPTY_CYCLES
        };
        Reaper {
            global: global,
            pipeline: pipeline,
            max_empty_cycles: max_empty_cycles,
            streaks: HashMap::new(),
        }
    }

    pub fn max_empty_cycles(&self) -> u32 {
        self.max_empty_cycles
    }

    /// Record one observation of a buffer. Returns true when the streak has
    /// reached the limit and the buffer should be removed; the streak entry
    /// is dropped along with it.
    fn observe(&mut self, namespace: &str, buffer_name: &str, size: usize) -> bool {
        let key = format!("{}{}", namespace, buffer_name);

        if size == 0 {
            let streak = {
                let counter = self.streaks.entry(key.clone()).or_insert(0);
                *counter += 1;
                *counter
            };
            if streak >= self.max_empty_cycles {
                self.streaks.remove(&key);
                return true;
            }
        } else {
            self.streaks.remove(&key);
        }

        false
    }
}

impl Task for Reaper {
    fn name(&self) -> &'static str {
        "reaper"
    }

    fn tick(&mut self) {
        debug!("reaper iteration");

        for (buffer_name, size) in self.global.buffer_sizes() {
            if self.observe("gb_", &buffer_name, size) {
                debug!("removing '{}' buffer from the global buffer", buffer_name);
                self.global.remove(&buffer_name);
            }
        }

        let pipeline = match self.pipeline {
            Some(ref pipeline) => pipeline.clone(),
            None => return,
        };
        for (buffer_name, size) in pipeline.buffer_sizes() {
            if self.observe("maths_", &buffer_name, size) {
                debug!(
                    "removing '{}' buffer from the aggregation pipeline",
                    buffer_name
                );
                pipeline.remove(&buffer_name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client::mock::Recorder;
    use message::Message;
    use stats::Registry;
    use tempdir::TempDir;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Arc;

    fn msg(name: &str) -> Arc<Message> {
        Arc::new(Message::new(name, 0.0, 0))
    }

    #[test]
    fn max_empty_cycles_is_clamped() {
        let client = Arc::new(Recorder::new(true));
        let global = Arc::new(GlobalBuffer::new(10, true, client));
        let reaper = Reaper::new(global.clone(), None, 0);
        assert_eq!(reaper.max_empty_cycles(), 2);

        let reaper = Reaper::new(global, None, 30);
        assert_eq!(reaper.max_empty_cycles(), 30);
    }

    #[test]
    fn empty_buffer_is_removed_after_the_streak() {
        let client = Arc::new(Recorder::new(true));
        let global = Arc::new(GlobalBuffer::new(999, false, client));
        global.add(msg("test.2"));
        global.add(msg("test.2"));

        let mut drained = Vec::new();
        global.take_by_name("test.2", &mut drained);
        assert_eq!(drained.len(), 2);

        let mut reaper = Reaper::new(global.clone(), None, 2);
        reaper.tick();
        assert!(global.buffer_sizes().contains_key("test.2"));
        reaper.tick();
        assert!(global.buffer_sizes().is_empty());
    }

    #[test]
    fn refilled_buffer_resets_its_streak() {
        let client = Arc::new(Recorder::new(true));
        let global = Arc::new(GlobalBuffer::new(999, false, client));
        global.add(msg("test.2"));

        let mut drained = Vec::new();
        global.take_by_name("test.2", &mut drained);

        let mut reaper = Reaper::new(global.clone(), None, 2);
        reaper.tick();

        // activity resets the streak, the next empty tick is a fresh start
        global.add(msg("test.2"));
        reaper.tick();
        global.take_by_name("test.2", &mut drained);
        reaper.tick();
        assert!(global.buffer_sizes().contains_key("test.2"));
        reaper.tick();
        assert!(global.buffer_sizes().is_empty());
    }

    #[test]
    fn aggregation_buffers_are_reaped_too() {
        let dir = TempDir::new("reaper").unwrap();
        let rules_path = dir.path().join("maths.toml");
        let mut file = File::create(&rules_path).unwrap();
        file.write_all(
            br#"
            [[category]]
            name = "nan."

              [[category.computation]]
              kind = "sum"
              every = "2"
            "#,
        ).unwrap();
        drop(file);

        let stats = Arc::new(Registry::new());
        let client = Arc::new(Recorder::new(true));
        let global = Arc::new(GlobalBuffer::new(999, false, client));
        let pipeline = Arc::new(Pipeline::new(&rules_path, global.clone(), 99, stats));

        assert!(pipeline.add(&msg("nani")));
        assert!(pipeline.add(&msg("nana")));
        assert!(pipeline.add(&msg("nana")));

        // "nana" fires and empties, "nani" keeps its lone message
        pipeline.tick(::time::now());

        let mut reaper = Reaper::new(global.clone(), Some(pipeline.clone()), 2);
        reaper.tick();
        reaper.tick();

        let mut remaining = Vec::new();
        pipeline.take_all(&mut remaining);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "nani");
    }
}
