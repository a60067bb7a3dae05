//! End-to-end persistence: pending messages survive a save/load cycle
//! through the on-disk text files.

extern crate graphite_proxy;
extern crate tempdir;

use graphite_proxy::buffer::GlobalBuffer;
use graphite_proxy::client::Client;
use graphite_proxy::maths::Pipeline;
use graphite_proxy::message::Message;
use graphite_proxy::router::Router;
use graphite_proxy::stats::Registry;
use tempdir::TempDir;
use std::fs;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;

/// A downstream that is never reachable, so nothing leaves the buffers.
struct Unreachable;

impl Client for Unreachable {
    fn send(&self, _batch: &[Arc<Message>]) -> bool {
        false
    }
}

fn fixture(dir: &TempDir) -> (Arc<GlobalBuffer>, Arc<Pipeline>, Router) {
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
    drop(file);

    let stats = Arc::new(Registry::new());
    let global = Arc::new(GlobalBuffer::new(10, true, Arc::new(Unreachable)));
    let pipeline = Arc::new(Pipeline::new(
        &rules_path,
        global.clone(),
        99,
        stats.clone(),
    ));
    assert!(pipeline.is_valid());
    let router = Router::new(global.clone(), Some(pipeline.clone()), stats);
    (global, pipeline, router)
}

#[test]
fn save_then_reload_round_trip() {
    let dir = TempDir::new("persistence").unwrap();
    let (global, pipeline, router) = fixture(&dir);

    assert!(router.route_line("normal.1 0 0"));
    assert!(router.route_line("normal.2 0 0"));
    assert!(router.route_line("test_2.nani 0 1234"));
    assert!(router.route_line("test_2.nani 1 5678"));

    let pass_through = dir.path().join("pass_through_messages.gp");
    let maths = dir.path().join("maths_messages.gp");

    // 2 pass-through lines plus 2 messages duplicated over 2 operations
    assert_eq!(router.serialize_pending(&pass_through, &maths), 6);

    let pass_content = fs::read_to_string(&pass_through).unwrap();
    assert_eq!(pass_content.lines().count(), 2);
    assert!(pass_content.contains("normal.1 0.000000 0"));
    assert!(pass_content.contains("normal.2 0.000000 0"));

    let maths_content = fs::read_to_string(&maths).unwrap();
    assert_eq!(maths_content.lines().count(), 4);
    assert!(maths_content.contains("test_2.nani 0.000000 1234 sum"));
    assert!(maths_content.contains("test_2.nani 0.000000 1234 average"));
    assert!(maths_content.contains("test_2.nani 1.000000 5678 sum"));
    assert!(maths_content.contains("test_2.nani 1.000000 5678 average"));

    // everything was drained by the save
    let mut drained = Vec::new();
    global.take_all(&mut drained);
    assert!(drained.is_empty());
    pipeline.take_all(&mut drained);
    assert!(drained.is_empty());

    // reload puts every message back where it was
    assert_eq!(router.load_pending(&pass_through, &maths), 6);

    let mut messages = Vec::new();
    global.take_all(&mut messages);
    assert_eq!(messages.len(), 2);

    messages.clear();
    pipeline.take_all(&mut messages);
    assert_eq!(messages.len(), 4);

    // the save files are removed after a successful read
    assert!(fs::metadata(&pass_through).is_err());
    assert!(fs::metadata(&maths).is_err());
}

#[test]
fn loading_with_nothing_saved_is_a_noop() {
    let dir = TempDir::new("persistence").unwrap();
    let (global, _pipeline, router) = fixture(&dir);

    let loaded = router.load_pending(
        &dir.path().join("absent_pass_through.gp"),
        &dir.path().join("absent_maths.gp"),
    );
    assert_eq!(loaded, 0);

    let mut messages = Vec::new();
    global.take_all(&mut messages);
    assert!(messages.is_empty());
}
