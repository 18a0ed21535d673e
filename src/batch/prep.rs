//! Preparing many ligands or proteins at once

use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::allocator::CpuAllocation;
use crate::batch::{check_unique_targets, create_output_root, BatchError, OUTCOMES_FILE};
use crate::config::ToolConfig;
use crate::executor::BatchExecutor;
use crate::prep::{LigandPreparer, PrepOptions, Preparer, ProteinPreparer};
use crate::progress::{LogProgress, ProgressReporter};
use crate::task::{file_stem, InputKey, TaskDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrepStatus {
    Success,
    Error,
}

/// Result of preparing one input file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrepRecord {
    pub input: PathBuf,
    pub status: PrepStatus,
    pub artifact_path: Option<PathBuf>,
    pub error: Option<String>,
}

/// One preparer applied to a list of inputs with shared options
#[derive(Clone)]
pub struct BatchPreparation {
    inputs: Vec<PathBuf>,
    preparer: Arc<dyn Preparer>,
    options: PrepOptions,
}

impl BatchPreparation {
    pub fn new(inputs: Vec<PathBuf>, preparer: Arc<dyn Preparer>, options: PrepOptions) -> Self {
        Self {
            inputs,
            preparer,
            options,
        }
    }

    pub fn ligands(inputs: Vec<PathBuf>, config: &ToolConfig, options: PrepOptions) -> Self {
        Self::new(inputs, Arc::new(LigandPreparer::new(config)), options)
    }

    pub fn proteins(inputs: Vec<PathBuf>, config: &ToolConfig, options: PrepOptions) -> Self {
        Self::new(inputs, Arc::new(ProteinPreparer::new(config)), options)
    }

    /// One descriptor per input, keyed by its path
    pub fn tasks(&self, allocation: &CpuAllocation) -> Vec<TaskDescriptor<InputKey, PathBuf>> {
        self.inputs
            .iter()
            .map(|input| {
                TaskDescriptor::new(InputKey(input.clone()), input.clone())
                    .with_cpu_share(allocation.cpu_per_worker)
            })
            .collect()
    }

    /// Prepare every input into `output_root`, one record per input in
    /// completion order
    pub fn prepare_all(&self, cpu: usize, output_root: &Path) -> Result<Vec<PrepRecord>, BatchError> {
        self.prepare_all_with(cpu, output_root, &mut LogProgress)
    }

    pub fn prepare_all_with(
        &self,
        cpu: usize,
        output_root: &Path,
        progress: &mut dyn ProgressReporter,
    ) -> Result<Vec<PrepRecord>, BatchError> {
        if self.inputs.is_empty() {
            return Err(BatchError::EmptyInput(format!(
                "no {} files to prepare",
                self.preparer.name()
            )));
        }
        check_unique_targets(
            self.inputs
                .iter()
                .map(|input| (input.as_path(), format!("{}.pdbqt", file_stem(input)))),
        )?;
        create_output_root(output_root)?;

        let allocation = CpuAllocation::compute(cpu, self.inputs.len());
        let tasks = self.tasks(&allocation);

        info!("Output directory: {}", output_root.display());
        let executor = BatchExecutor::new(allocation)?;
        let preparer = self.preparer.as_ref();
        let options = &self.options;
        let label = format!("{} preparation", preparer.name());

        // the preparation tools are single threaded, so the CPU share is unused
        let outcomes = executor.run(
            &label,
            tasks,
            |input: &PathBuf, _cpu: usize| preparer.prepare(input, options, output_root),
            progress,
        )?;
        outcomes.write_json(output_root.join(OUTCOMES_FILE))?;

        let records = outcomes
            .into_entries()
            .into_iter()
            .map(|(key, outcome)| match outcome {
                Ok(path) => PrepRecord {
                    input: key.0,
                    status: PrepStatus::Success,
                    artifact_path: Some(path),
                    error: None,
                },
                Err(message) => PrepRecord {
                    input: key.0,
                    status: PrepStatus::Error,
                    artifact_path: None,
                    error: Some(message),
                },
            })
            .collect();
        Ok(records)
    }
}
