//! CPU budget partitioning between batch workers

use serde::{Deserialize, Serialize};

/// How a CPU budget is split across a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuAllocation {
    /// Number of tasks running at the same time
    pub worker_count: usize,

    /// Threads handed to the external tool of each task
    pub cpu_per_worker: usize,
}

impl CpuAllocation {
    /// Split `total_cpu` across `task_count` tasks.
    ///
    /// Zero inputs are clamped to one. Cores left over by the integer division
    /// stay unused.
    pub fn compute(total_cpu: usize, task_count: usize) -> Self {
        let total_cpu = total_cpu.max(1);
        let task_count = task_count.max(1);

        let worker_count = total_cpu.min(task_count);
        let cpu_per_worker = (total_cpu / worker_count).max(1);

        Self {
            worker_count,
            cpu_per_worker,
        }
    }

    /// Cores actually handed out
    pub fn total_allocated(&self) -> usize {
        self.worker_count * self.cpu_per_worker
    }
}

/// Number of logical cores, or 1 if it cannot be determined
pub fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
