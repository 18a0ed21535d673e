//! Progress hooks driven by the batch executor

use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::allocator::CpuAllocation;
use crate::outcome::BatchSummary;

/// Receives batch lifecycle events on the driving thread
pub trait ProgressReporter {
    /// Called once before any task is dispatched
    fn on_start(&mut self, _label: &str, _task_count: usize, _allocation: &CpuAllocation) {}

    /// Called as soon as one task resolves, with the artifact description or
    /// the failure message
    fn on_outcome(&mut self, done: usize, total: usize, key: &str, outcome: Result<&str, &str>);

    /// Called after every task has resolved
    fn on_finish(&mut self, _label: &str, _summary: &BatchSummary) {}
}

/// Reports progress through the `log` facade
#[derive(Debug, Default, Clone)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn on_start(&mut self, label: &str, task_count: usize, allocation: &CpuAllocation) {
        info!("Starting {} for {} tasks", label, task_count);
        info!(
            "Using {} parallel workers, {} CPUs per worker ({} total)",
            allocation.worker_count,
            allocation.cpu_per_worker,
            allocation.total_allocated()
        );
    }

    fn on_outcome(&mut self, done: usize, total: usize, key: &str, outcome: Result<&str, &str>) {
        match outcome {
            Ok(artifact) => info!("[{}/{}] ✓ {} -> {}", done, total, key, artifact),
            Err(message) => warn!("[{}/{}] ✗ {} failed: {}", done, total, key, message),
        }
    }

    fn on_finish(&mut self, label: &str, summary: &BatchSummary) {
        info!("{} completed: {}", label, summary);
    }
}

/// Discards every event
#[derive(Debug, Default, Clone)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn on_outcome(&mut self, _: usize, _: usize, _: &str, _: Result<&str, &str>) {}
}

/// Something a finished task produced that can be named in a progress line
pub trait Artifact {
    fn describe(&self) -> String;
}

impl Artifact for PathBuf {
    fn describe(&self) -> String {
        describe_path(self)
    }
}

pub(crate) fn describe_path(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
