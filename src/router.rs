//! Message routing: every inbound line lands here and is classified as
//! aggregation traffic or pass-through. The router also owns the
//! on-shutdown persistence protocol.

use buffer::GlobalBuffer;
use maths::{Kind, Pipeline};
use message::Message;
use stats;
use stats::Registry;
use std::fs;
use std::fs::File;
use std::io;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

pub struct Router {
    global: Arc<GlobalBuffer>,
    pipeline: Option<Arc<Pipeline>>,
    stats: Arc<Registry>,
}

impl Router {
    pub fn new(
        global: Arc<GlobalBuffer>,
        pipeline: Option<Arc<Pipeline>>,
        stats: Arc<Registry>,
    ) -> Router {
        Router {
            global: global,
            pipeline: pipeline,
            stats: stats,
        }
    }

    /// Parse one raw line and route the result. Unparsable lines are
    /// dropped, counted and logged.
    pub fn route_line(&self, line: &str) -> bool {
        if line.is_empty() {
            return false;
        }
        match Message::parse_line(line) {
            Some(message) => self.route(Arc::new(message)),
            None => {
                self.bad_syntax(line);
                false
            }
        }
    }

    /// Route a parsed message: to the pipeline when a category wants it,
    /// else to the global buffer.
    pub fn route(&self, message: Arc<Message>) -> bool {
        if !message.is_valid() {
            self.bad_syntax(&message.serialize());
            return false;
        }

        self.stats.raise(stats::MESSAGES_CREATED, 1);

        match self.pipeline {
            Some(ref pipeline) if pipeline.is_wanted(&message.name) => {
                debug!("route message to aggregation: {}", message.serialize());
                pipeline.add(&message)
            }
            _ => {
                debug!("route message to global buffer: {}", message.serialize());
                self.global.add(message)
            }
        }
    }

    fn bad_syntax(&self, line: &str) {
        warn!("bad message syntax, dropping: {}", line);
        self.stats.raise(stats::REQUESTS_DROPPED, 1);
    }

    /// Drain every pending message to disk: pass-through messages one per
    /// line into `pass_through_path`, aggregation messages into
    /// `maths_path` with the computation kind appended as a fourth token.
    ///
    /// Returns the number of saved messages, or -1 when any file could not
    /// be written; whatever could be written is already on disk.
    pub fn serialize_pending(&self, pass_through_path: &Path, maths_path: &Path) -> i64 {
        let mut failed = false;
        let mut total = 0;

        let mut messages = Vec::new();
        self.global.take_all(&mut messages);
        match write_pass_through(&messages, pass_through_path) {
            Ok(count) => {
                debug!("{} pass through messages saved", count);
                total += count;
            }
            Err(e) => {
                error!(
                    "can't save pass through messages into {} (they are lost): {}",
                    pass_through_path.display(),
                    e
                );
                failed = true;
            }
        }

        if let Some(ref pipeline) = self.pipeline {
            let mut tagged = Vec::new();
            pipeline.take_all_with_kinds(&mut tagged);
            match write_maths(&tagged, maths_path) {
                Ok(count) => {
                    debug!("{} aggregation messages saved", count);
                    total += count;
                }
                Err(e) => {
                    error!(
                        "can't save aggregation messages into {} (they are lost): {}",
                        maths_path.display(),
                        e
                    );
                    failed = true;
                }
            }
        }

        if failed {
            -1
        } else {
            total
        }
    }

    /// Reload messages saved by a previous shutdown. Missing files simply
    /// contribute nothing; a read file is deleted afterwards.
    pub fn load_pending(&self, pass_through_path: &Path, maths_path: &Path) -> i64 {
        let mut loaded = self.load_file(pass_through_path, false);
        if self.pipeline.is_some() {
            loaded += self.load_file(maths_path, true);
        }
        loaded
    }

    fn load_file(&self, path: &Path, maths: bool) -> i64 {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(_) => {
                info!("no saved messages to load from {}", path.display());
                return 0;
            }
        };

        debug!("loading saved messages from {}", path.display());
        let mut loaded = 0;
        let reader = BufReader::new(file);
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("can't read saved messages from {}: {}", path.display(), e);
                    break;
                }
            };
            if line.is_empty() {
                continue;
            }

            if maths {
                if self.load_maths_line(&line) {
                    loaded += 1;
                }
            } else if self.route_line(&line) {
                loaded += 1;
            }
        }

        let _ = fs::remove_file(path);

        debug!("{} messages loaded from {}", loaded, path.display());
        loaded
    }

    fn load_maths_line(&self, line: &str) -> bool {
        let tokens: Vec<&str> = line.split(' ').collect();
        if tokens.len() != 4 {
            warn!("bad saved aggregation message syntax: {}", line);
            return false;
        }

        let kind = match Kind::from_str(tokens[3]) {
            Some(kind) => kind,
            None => {
                warn!("unknown computation kind in saved message: {}", line);
                return false;
            }
        };
        let message = match Message::parse_line(&tokens[..3].join(" ")) {
            Some(message) => message,
            None => {
                warn!("bad saved aggregation message syntax: {}", line);
                return false;
            }
        };

        match self.pipeline {
            Some(ref pipeline) => pipeline.add_filtered(&Arc::new(message), Some(kind)),
            None => false,
        }
    }
}

fn write_pass_through(messages: &[Arc<Message>], path: &Path) -> io::Result<i64> {
    if messages.is_empty() {
        return Ok(0);
    }
    let mut file = File::create(path)?;
    for message in messages {
        writeln!(file, "{}", message.serialize())?;
    }
    Ok(messages.len() as i64)
}

fn write_maths(tagged: &[(Arc<Message>, Kind)], path: &Path) -> io::Result<i64> {
    if tagged.is_empty() {
        return Ok(0);
    }
    let mut file = File::create(path)?;
    for &(ref message, kind) in tagged {
        writeln!(file, "{} {}", message.serialize(), kind.as_str())?;
    }
    Ok(tagged.len() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use buffer::GlobalBuffer;
    use client::mock::Recorder;
    use stats::Registry;
    use tempdir::TempDir;
    use std::fs::File;
    use std::io::Write;

    fn fixture() -> (TempDir, Arc<GlobalBuffer>, Arc<Pipeline>, Router) {
        let dir = TempDir::new("router").unwrap();
        let rules_path = dir.path().join("maths.toml");
        let mut file = File::create(&rules_path).unwrap();
        file.write_all(
            br#"
            [[category]]
            name = "test_2\\..+"

              [[category.computation]]
              kind = "sum"
              every = "99"

              [[category.computation]]
              kind = "average"
              every = "99"
            "#,
        ).unwrap();

        let stats = Arc::new(Registry::new());
        let client = Arc::new(Recorder::new(true));
        let global = Arc::new(GlobalBuffer::new(10, true, client));
        let pipeline = Arc::new(Pipeline::new(&rules_path, global.clone(), 99, stats.clone()));
        assert!(pipeline.is_valid());
        let router = Router::new(global.clone(), Some(pipeline.clone()), stats);
        (dir, global, pipeline, router)
    }

    #[test]
    fn classification() {
        let (_dir, global, pipeline, router) = fixture();

        assert!(router.route_line("normal.1 0 0"));
        assert!(router.route_line("test_2.nani 0 1234"));
        assert!(!router.route_line("broken line"));
        assert!(!router.route_line(""));

        let mut messages = Vec::new();
        global.take_all(&mut messages);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].name, "normal.1");

        messages.clear();
        pipeline.take_all(&mut messages);
        assert_eq!(messages.len(), 2); // one per operation
    }

    #[test]
    fn persistence_round_trip() {
        let (dir, global, pipeline, router) = fixture();

        assert!(router.route_line("normal.1 0 0"));
        assert!(router.route_line("normal.2 0 0"));
        assert!(router.route_line("test_2.nani 0 1234"));
        assert!(router.route_line("test_2.nani 1 5678"));

        let pass_through = dir.path().join("pass_through_messages.gp");
        let maths = dir.path().join("maths_messages.gp");

        assert_eq!(router.serialize_pending(&pass_through, &maths), 6);

        let content = ::std::fs::read_to_string(&pass_through).unwrap();
        let mut lines: Vec<&str> = content.lines().collect();
        lines.sort();
        assert_eq!(lines, vec!["normal.1 0.000000 0", "normal.2 0.000000 0"]);

        let content = ::std::fs::read_to_string(&maths).unwrap();
        let mut lines: Vec<&str> = content.lines().collect();
        lines.sort();
        assert_eq!(
            lines,
            vec![
                "test_2.nani 0.000000 1234 average",
                "test_2.nani 0.000000 1234 sum",
                "test_2.nani 1.000000 5678 average",
                "test_2.nani 1.000000 5678 sum",
            ]
        );

        assert_eq!(router.load_pending(&pass_through, &maths), 6);

        let mut messages = Vec::new();
        global.take_all(&mut messages);
        assert_eq!(messages.len(), 2);

        messages.clear();
        pipeline.take_all(&mut messages);
        assert_eq!(messages.len(), 4);

        // both save files are gone
        assert!(File::open(&pass_through).is_err());
        assert!(File::open(&maths).is_err());
    }

    #[test]
    fn nothing_pending_saves_nothing() {
        let (dir, _global, _pipeline, router) = fixture();
        let pass_through = dir.path().join("pt.gp");
        let maths = dir.path().join("m.gp");
        assert_eq!(router.serialize_pending(&pass_through, &maths), 0);
        assert!(File::open(&pass_through).is_err());
        assert_eq!(router.load_pending(&pass_through, &maths), 0);
    }

    #[test]
    fn malformed_saved_maths_lines_are_skipped() {
        let (dir, _global, pipeline, router) = fixture();
        let maths = dir.path().join("maths_messages.gp");
        let mut file = File::create(&maths).unwrap();
        file.write_all(
            b"test_2.nani 1.000000 5678 sum\n\
              missing tokens\n\
              test_2.nani 1.000000 5678 frobnicate\n",
        ).unwrap();
        drop(file);

        let pass_through = dir.path().join("absent.gp");
        assert_eq!(router.load_pending(&pass_through, &maths), 1);

        let mut messages = Vec::new();
        pipeline.take_all(&mut messages);
        assert_eq!(messages.len(), 1);
    }
}
