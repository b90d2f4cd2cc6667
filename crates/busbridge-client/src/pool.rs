use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of threads draining an unbounded job queue.
///
/// Handlers never run on the read loop, so a slow subscriber cannot stall
/// frame intake. Workers exit once every handle to the pool is dropped.
#[derive(Clone)]
pub(crate) struct WorkerPool {
    jobs: Sender<Job>,
}

impl WorkerPool {
    pub(crate) fn new(name: &str, threads: usize) -> Result<Self> {
        let (jobs, queue) = unbounded::<Job>();

        for index in 0..threads.max(1) {
            let queue = queue.clone();
            thread::Builder::new()
                .name(format!("{name}-{index}"))
                .spawn(move || run_worker(&queue))
                .map_err(|source| BridgeError::Spawn {
                    what: "worker",
                    source,
                })?;
        }

        Ok(Self { jobs })
    }

    /// Queue a job. Returns false if the workers are gone.
    pub(crate) fn execute(&self, job: impl FnOnce() + Send + 'static) -> bool {
        if self.jobs.send(Box::new(job)).is_err() {
            debug!("worker pool closed; dropping job");
            return false;
        }
        true
    }
}

fn run_worker(queue: &Receiver<Job>) {
    while let Ok(job) = queue.recv() {
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            warn!("handler panicked; worker continues");
        }
    }
}
