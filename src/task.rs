//! Periodic worker scaffolding shared by the flusher, the aggregation
//! ticker, the reaper and the statistics collector.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// A unit of work invoked once per period. The worker owns the task, so a
/// tick never overlaps itself.
pub trait Task: Send + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// One iteration.
    fn tick(&mut self);
}

/// Drives a [`Task`](trait.Task.html) on a fixed period from its own
/// thread: sleep, tick, sleep again, until stopped.
pub struct Runner {
    period: u64,
    worker: Option<Worker>,
}

struct Worker {
    stop: mpsc::Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl Runner {
    /// `period` is in seconds.
    pub fn new(period: u64) -> Runner {
        Runner {
            period: period,
            worker: None,
        }
    }

    /// Spawn the worker. Returns false when one is already running.
    pub fn start<T: Task>(&mut self, mut task: T) -> bool {
        if self.worker.is_some() {
            warn!("{} worker is already started, ignoring call to start", task.name());
            return false;
        }
        debug!("starting {} worker", task.name());

        let (stop, wakeup) = mpsc::channel();
        let period = Duration::from_secs(self.period);
        let handle = thread::spawn(move || loop {
            match wakeup.recv_timeout(period) {
                Err(mpsc::RecvTimeoutError::Timeout) => task.tick(),
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => return,
            }
        });

        self.worker = Some(Worker {
            stop: stop,
            handle: handle,
        });
        true
    }

    /// Interrupt the current sleep and join the worker. A stop signal
    /// arriving mid-tick takes effect once the tick finishes.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop.send(());
            let _ = worker.handle.join();
        }
    }

    pub fn is_started(&self) -> bool {
        self.worker.is_some()
    }

    /// The configured period, in seconds.
    pub fn period(&self) -> u64 {
        self.period
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.stop();
    }
}
