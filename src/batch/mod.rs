//! Batch entry points: many receptors, ligands or structures at once
//!
//! Each batch validates its inputs, sizes a worker pool from the CPU budget,
//! runs one external-tool task per input combination and returns the outcome
//! of every task. Configuration problems are reported before any work starts;
//! failures of individual tasks are only recorded.

pub mod docking;
pub mod inputs;
pub mod pocket;
pub mod prep;

pub use docking::BatchDocking;
pub use inputs::collect_inputs;
pub use pocket::{receptor_centers, BatchPocketFinder};
pub use prep::{BatchPreparation, PrepRecord, PrepStatus};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::executor::ExecutorError;
use crate::io::IoError;
use crate::outcome::OutcomeError;
use crate::task::TaskError;

/// Outcome export written at the root of every batch
pub const OUTCOMES_FILE: &str = "batch_outcomes.json";

/// Errors that stop a batch before or after its tasks run
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Nothing to do: {0}")]
    EmptyInput(String),

    #[error("Input path does not exist: {0}")]
    MissingInput(PathBuf),

    #[error("Invalid file type: {path}. Supported: {supported}")]
    UnsupportedExtension { path: PathBuf, supported: String },

    #[error("Invalid center: {0}")]
    InvalidCenter(String),

    #[error("Task {0} is listed more than once")]
    DuplicateTask(String),

    #[error("Tasks {first} and {second} would write to the same location '{dir}'")]
    DirectoryCollision {
        first: String,
        second: String,
        dir: String,
    },

    #[error("Failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write summary: {0}")]
    Summary(#[from] IoError),

    #[error("Failed to export outcomes: {0}")]
    Export(#[from] OutcomeError),

    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl From<TaskError> for BatchError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::InvalidCenter(s) => BatchError::InvalidCenter(s),
            TaskError::DuplicateKey(key) => BatchError::DuplicateTask(key),
            TaskError::DirectoryCollision { first, second, dir } => {
                BatchError::DirectoryCollision { first, second, dir }
            }
        }
    }
}

impl From<ExecutorError> for BatchError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Pool(e) => BatchError::Pool(e),
            ExecutorError::DuplicateKey(key) => BatchError::DuplicateTask(key),
        }
    }
}

pub(crate) fn create_output_root(path: &Path) -> Result<(), BatchError> {
    fs::create_dir_all(path).map_err(|source| BatchError::OutputDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Reject two inputs whose per-input output locations coincide
pub(crate) fn check_unique_targets<'a, I>(targets: I) -> Result<(), BatchError>
where
    I: IntoIterator<Item = (&'a Path, String)>,
{
    let mut seen: HashMap<String, &Path> = HashMap::new();
    for (input, target) in targets {
        if let Some(first) = seen.get(&target) {
            if *first == input {
                return Err(BatchError::DuplicateTask(input.display().to_string()));
            }
            return Err(BatchError::DirectoryCollision {
                first: first.display().to_string(),
                second: input.display().to_string(),
                dir: target,
            });
        }
        seen.insert(target, input);
    }
    Ok(())
}
