//! Every ligand against every pocket center of every receptor

use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::allocator::CpuAllocation;
use crate::batch::{create_output_root, BatchError, OUTCOMES_FILE};
use crate::engines::DockingEngine;
use crate::executor::BatchExecutor;
use crate::io::{self, PoseRecord};
use crate::outcome::OutcomeMap;
use crate::progress::{LogProgress, ProgressReporter};
use crate::task::{
    build_docking_tasks, task_dir_name, validate_docking_tasks, DockingArgs, ReceptorCenters,
    TaskDescriptor, TaskKey,
};

/// A receptor × center × ligand docking batch
#[derive(Clone)]
pub struct BatchDocking {
    receptors: ReceptorCenters,
    ligands: Vec<PathBuf>,
    engine: Arc<dyn DockingEngine>,
}

impl BatchDocking {
    pub fn new(receptors: ReceptorCenters, ligands: Vec<PathBuf>, engine: Arc<dyn DockingEngine>) -> Self {
        Self {
            receptors,
            ligands,
            engine,
        }
    }

    pub fn engine(&self) -> &dyn DockingEngine {
        self.engine.as_ref()
    }

    /// Validated task list, in receptor → center → ligand order
    pub fn tasks(&self) -> Result<Vec<TaskDescriptor<TaskKey, DockingArgs>>, BatchError> {
        let tasks = build_docking_tasks(&self.receptors, &self.ligands);
        if tasks.is_empty() {
            return Err(BatchError::EmptyInput(format!(
                "{} receptors, {} pocket centers and {} ligands give no docking tasks",
                self.receptors.len(),
                self.receptors.iter().map(|(_, c)| c.len()).sum::<usize>(),
                self.ligands.len()
            )));
        }

        validate_docking_tasks(&tasks)?;
        Ok(tasks)
    }

    /// Dock everything and write the combined summary, logging progress
    pub fn run_all(&self, cpu: usize, output_root: &Path) -> Result<OutcomeMap<TaskKey, PathBuf>, BatchError> {
        self.run_all_with(cpu, output_root, &mut LogProgress)
    }

    /// [`BatchDocking::run_all`] with a caller supplied progress reporter
    pub fn run_all_with(
        &self,
        cpu: usize,
        output_root: &Path,
        progress: &mut dyn ProgressReporter,
    ) -> Result<OutcomeMap<TaskKey, PathBuf>, BatchError> {
        let tasks = self.tasks()?;
        create_output_root(output_root)?;

        let allocation = CpuAllocation::compute(cpu, tasks.len());
        let tasks: Vec<_> = tasks
            .into_iter()
            .map(|t| t.with_cpu_share(allocation.cpu_per_worker))
            .collect();

        info!("Output directory: {}", output_root.display());
        let executor = BatchExecutor::new(allocation)?;
        let engine = self.engine.as_ref();
        let label = format!("{} docking", engine.name());

        let outcomes = executor.run(
            &label,
            tasks,
            |args: &DockingArgs, cpu: usize| engine.dock(args, cpu, &output_root.join(task_dir_name(args))),
            progress,
        )?;

        outcomes.write_json(output_root.join(OUTCOMES_FILE))?;
        self.parse_results(&outcomes, output_root)?;
        Ok(outcomes)
    }

    /// Parse the log of every successful task and write the engine's summary
    /// CSV at `output_root`. Tasks whose log cannot be parsed are skipped.
    pub fn parse_results(
        &self,
        outcomes: &OutcomeMap<TaskKey, PathBuf>,
        output_root: &Path,
    ) -> Result<PathBuf, BatchError> {
        let engine = self.engine.as_ref();
        let mut rows: Vec<(&TaskKey, PoseRecord)> = Vec::new();

        for (key, task_dir) in outcomes.successes() {
            match engine.parse_log(task_dir) {
                Ok(poses) => rows.extend(poses.into_iter().map(|pose| (key, pose))),
                Err(err) => warn!("Skipping {} in summary: {}", key, err),
            }
        }

        let path = output_root.join(engine.summary_file_name());
        let written = io::write_summary(&path, engine.pose_columns(), rows.iter().map(|(k, p)| (*k, p)))?;
        info!("Wrote {} poses to {}", written, path.display());
        Ok(path)
    }
}
