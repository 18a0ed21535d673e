//! Bounded worker pool that runs task descriptors and streams their outcomes
//!
//! Every task runs on one pool thread and usually spawns one external tool
//! process, so a batch has two levels of nesting: worker thread -> tool process.
//! Outcomes are sent back over a channel and recorded by the calling thread in
//! completion order.

use log::{debug, error};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use thiserror::Error;

use crate::allocator::CpuAllocation;
use crate::outcome::{Outcome, OutcomeMap};
use crate::progress::{Artifact, ProgressReporter};
use crate::task::TaskDescriptor;

/// Message recorded for a task whose worker never reported back
pub const LOST_WORKER_MESSAGE: &str = "worker terminated before reporting an outcome";

/// Errors raised before any task is dispatched
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("Task {0} was submitted more than once")]
    DuplicateKey(String),
}

/// Fixed-size pool sized by a [`CpuAllocation`]
pub struct BatchExecutor {
    pool: ThreadPool,
    allocation: CpuAllocation,
}

impl fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("allocation", &self.allocation)
            .finish()
    }
}

impl BatchExecutor {
    /// Build a pool with `allocation.worker_count` threads
    pub fn new(allocation: CpuAllocation) -> Result<Self, ExecutorError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(allocation.worker_count.max(1))
            .thread_name(|i| format!("dockbatch-worker-{}", i))
            .build()?;

        Ok(Self { pool, allocation })
    }

    pub fn allocation(&self) -> CpuAllocation {
        self.allocation
    }

    /// Run every descriptor through `op` and collect one outcome per task.
    ///
    /// Errors returned by `op` and panics inside it are recorded as failures
    /// under the task's key; they never abort sibling tasks. The only error
    /// returned from here is a duplicate key, detected before dispatch.
    pub fn run<K, A, T, E, F>(
        &self,
        label: &str,
        tasks: Vec<TaskDescriptor<K, A>>,
        op: F,
        progress: &mut dyn ProgressReporter,
    ) -> Result<OutcomeMap<K, T>, ExecutorError>
    where
        K: Eq + Hash + Clone + fmt::Display,
        A: Send,
        T: Send + Artifact,
        E: std::error::Error,
        F: Fn(&A, usize) -> Result<T, E> + Sync,
    {
        let total = tasks.len();
        let mut seen = HashSet::with_capacity(total);
        for task in &tasks {
            if !seen.insert(&task.key) {
                return Err(ExecutorError::DuplicateKey(task.key.to_string()));
            }
        }
        drop(seen);

        let mut outcomes = OutcomeMap::with_capacity(total);
        let mut pending: HashMap<usize, K> = HashMap::with_capacity(total);
        let (tx, rx) = mpsc::channel::<(usize, Outcome<T>)>();
        let op = &op;

        progress.on_start(label, total, &self.allocation);

        self.pool.in_place_scope(|scope| {
            for (index, task) in tasks.into_iter().enumerate() {
                let TaskDescriptor {
                    key,
                    args,
                    cpu_share,
                } = task;
                debug!("Submitting task {} ({} CPUs)", key, cpu_share);
                pending.insert(index, key);

                let tx = tx.clone();
                scope.spawn(move |_| {
                    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| op(&args, cpu_share))) {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(err)) => Err(error_chain(&err)),
                        Err(payload) => Err(format!("worker panicked: {}", panic_message(payload.as_ref()))),
                    };
                    // The receiver outlives the scope, so this only fails if the
                    // driving thread is already gone.
                    let _ = tx.send((index, outcome));
                });
            }
            drop(tx);

            for (index, outcome) in rx.iter() {
                let Some(key) = pending.remove(&index) else {
                    error!("Received an outcome for unknown task #{}", index);
                    continue;
                };
                record(&mut outcomes, key, outcome, total, progress);
            }
        });

        // Tasks whose worker dropped its sender without reporting
        let mut lost: Vec<(usize, K)> = pending.into_iter().collect();
        lost.sort_by_key(|(index, _)| *index);
        for (_, key) in lost {
            record(&mut outcomes, key, Err(LOST_WORKER_MESSAGE.to_string()), total, progress);
        }

        progress.on_finish(label, &outcomes.summary());
        Ok(outcomes)
    }
}

fn record<K, T>(
    outcomes: &mut OutcomeMap<K, T>,
    key: K,
    outcome: Outcome<T>,
    total: usize,
    progress: &mut dyn ProgressReporter,
) where
    K: Eq + Hash + Clone + fmt::Display,
    T: Artifact,
{
    let label = key.to_string();
    let done = outcomes.len() + 1;
    match &outcome {
        Ok(value) => progress.on_outcome(done, total, &label, Ok(&value.describe())),
        Err(message) => progress.on_outcome(done, total, &label, Err(message.as_str())),
    }

    // keys were checked for uniqueness before dispatch
    if let Err(err) = outcomes.insert(key, outcome) {
        error!("{}", err);
    }
}

/// Render an error and its sources on one line
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
