//! Pocket prediction over many structures

use log::info;
use std::path::{Path, PathBuf};

use crate::allocator::CpuAllocation;
use crate::batch::{check_unique_targets, create_output_root, BatchError, OUTCOMES_FILE};
use crate::executor::BatchExecutor;
use crate::outcome::OutcomeMap;
use crate::pocket::{PocketFinder, PocketReport};
use crate::progress::{LogProgress, ProgressReporter};
use crate::task::{file_stem, InputKey, ReceptorCenters, TaskDescriptor};

/// Runs P2Rank on a list of structures
#[derive(Debug, Clone)]
pub struct BatchPocketFinder {
    structures: Vec<PathBuf>,
    finder: PocketFinder,
}

impl BatchPocketFinder {
    pub fn new(structures: Vec<PathBuf>, finder: PocketFinder) -> Self {
        Self { structures, finder }
    }

    /// Report directory of one structure, relative to the output root
    pub fn pocket_dir_name(structure: &Path) -> String {
        format!("{}_pockets", file_stem(structure))
    }

    pub fn run_all(&self, cpu: usize, output_root: &Path) -> Result<OutcomeMap<InputKey, PocketReport>, BatchError> {
        self.run_all_with(cpu, output_root, &mut LogProgress)
    }

    pub fn run_all_with(
        &self,
        cpu: usize,
        output_root: &Path,
        progress: &mut dyn ProgressReporter,
    ) -> Result<OutcomeMap<InputKey, PocketReport>, BatchError> {
        if self.structures.is_empty() {
            return Err(BatchError::EmptyInput("no structures for pocket prediction".to_string()));
        }
        check_unique_targets(
            self.structures
                .iter()
                .map(|s| (s.as_path(), Self::pocket_dir_name(s))),
        )?;
        create_output_root(output_root)?;

        let allocation = CpuAllocation::compute(cpu, self.structures.len());
        let tasks: Vec<_> = self
            .structures
            .iter()
            .map(|s| {
                TaskDescriptor::new(InputKey(s.clone()), s.clone())
                    .with_cpu_share(allocation.cpu_per_worker)
            })
            .collect();

        info!("Output directory: {}", output_root.display());
        let executor = BatchExecutor::new(allocation)?;
        let finder = &self.finder;

        let outcomes = executor.run(
            "pocket prediction",
            tasks,
            |structure: &PathBuf, cpu: usize| {
                finder.find(structure, cpu, &output_root.join(Self::pocket_dir_name(structure)))
            },
            progress,
        )?;

        outcomes.write_json(output_root.join(OUTCOMES_FILE))?;
        Ok(outcomes)
    }
}

/// Docking input built from successful pocket predictions.
///
/// Receptors are ordered by path so the resulting docking batch does not
/// depend on completion order. `max_pockets` keeps only the best ranked
/// pockets of each receptor.
pub fn receptor_centers(
    outcomes: &OutcomeMap<InputKey, PocketReport>,
    max_pockets: Option<usize>,
) -> ReceptorCenters {
    let mut receptors: ReceptorCenters = outcomes
        .successes()
        .map(|(key, report)| {
            let mut centers = report.centers();
            if let Some(limit) = max_pockets {
                centers.truncate(limit);
            }
            (key.path().to_path_buf(), centers)
        })
        .collect();

    receptors.sort_by(|a, b| a.0.cmp(&b.0));
    receptors
}
