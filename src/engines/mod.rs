//! Docking engines driven by the batch runner

pub mod ad4;
pub mod vina;

pub use ad4::{Ad4Engine, Ad4Options, SeedValue};
pub use vina::{VinaEngine, VinaOptions};

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::io::{self, IoError, PoseRecord};
use crate::process::ToolError;
use crate::task::DockingArgs;

/// Number of log lines embedded in an engine failure
pub const LOG_TAIL_LINES: usize = 40;

/// Errors that can occur while docking one receptor/ligand pair
#[derive(Error, Debug)]
pub enum DockingError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("{tool} failed, last lines of {log}:\n{tail}")]
    ToolLog {
        tool: String,
        log: String,
        tail: String,
    },

    #[error("Expected output {0} was not produced")]
    MissingOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    File(#[from] IoError),
}

/// An external docking program
///
/// The Send + Sync bounds let one engine be shared by every worker of a batch.
pub trait DockingEngine: Send + Sync {
    /// Short engine name used in logs
    fn name(&self) -> &'static str;

    /// File written at the output root by the summary step
    fn summary_file_name(&self) -> &'static str;

    /// Log file, relative to a task directory, read by [`DockingEngine::parse_log`]
    fn log_file_name(&self) -> &'static str;

    /// Pose columns of the summary table
    fn pose_columns(&self) -> &'static [&'static str];

    /// Dock one pair into `out_dir` and return the directory
    fn dock(&self, args: &DockingArgs, cpu: usize, out_dir: &Path) -> Result<PathBuf, DockingError>;

    /// Read the poses of a finished task directory
    fn parse_log(&self, out_dir: &Path) -> Result<Vec<PoseRecord>, IoError>;
}

/// Check that both inputs exist and are PDBQT files
pub(crate) fn validate_inputs(args: &DockingArgs) -> Result<(), DockingError> {
    for (role, path) in [("Receptor", &args.receptor), ("Ligand", &args.ligand)] {
        if !path.is_file() {
            return Err(DockingError::InvalidInput(format!(
                "{} file not found: {}",
                role,
                path.display()
            )));
        }

        let is_pdbqt = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdbqt"))
            .unwrap_or(false);
        if !is_pdbqt {
            return Err(DockingError::InvalidInput(format!(
                "{} must be a .pdbqt file: {}",
                role,
                path.display()
            )));
        }
    }
    Ok(())
}

/// Create `out_dir` and copy both inputs into it
pub(crate) fn stage_inputs(
    args: &DockingArgs,
    out_dir: &Path,
) -> Result<(PathBuf, PathBuf), DockingError> {
    validate_inputs(args)?;
    fs::create_dir_all(out_dir)?;

    let receptor = io::copy_into(&args.receptor, out_dir)?;
    let ligand = io::copy_into(&args.ligand, out_dir)?;
    Ok((receptor, ligand))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Center;

    #[test]
    fn test_validate_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let receptor = dir.path().join("rec.pdbqt");
        let ligand = dir.path().join("lig.mol2");
        fs::write(&receptor, "ATOM").unwrap();
        fs::write(&ligand, "@<TRIPOS>").unwrap();

        let mut args = DockingArgs {
            receptor: receptor.clone(),
            ligand: dir.path().join("missing.pdbqt"),
            center: Center::new(0.0, 0.0, 0.0),
        };
        let err = validate_inputs(&args).unwrap_err().to_string();
        assert!(err.contains("Ligand file not found"));

        args.ligand = ligand;
        let err = validate_inputs(&args).unwrap_err().to_string();
        assert!(err.contains("must be a .pdbqt file"));
    }

    #[test]
    fn test_stage_inputs_copies_files() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let receptor = src.path().join("rec.pdbqt");
        let ligand = src.path().join("lig.PDBQT");
        fs::write(&receptor, "receptor").unwrap();
        fs::write(&ligand, "ligand").unwrap();

        let args = DockingArgs {
            receptor,
            ligand,
            center: Center::new(0.0, 0.0, 0.0),
        };
        let task_dir = out.path().join("task");
        let (rec, lig) = stage_inputs(&args, &task_dir).unwrap();

        assert_eq!(rec, task_dir.join("rec.pdbqt"));
        assert_eq!(fs::read_to_string(lig).unwrap(), "ligand");
    }
}
