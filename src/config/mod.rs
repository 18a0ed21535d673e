//! Locations of the external tools and limits applied to every invocation

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value '{value}' for {name}")]
    InvalidValue { name: String, value: String },
}

/// Paths to the external binaries plus the scratch directory and timeout.
///
/// Built once and handed to each tool wrapper at construction. Bare names are
/// resolved through `PATH` when the tool is launched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// AutoDock Vina executable
    pub vina: PathBuf,

    /// AutoGrid4 executable
    pub autogrid: PathBuf,

    /// AutoDock4 executable
    pub autodock: PathBuf,

    /// P2Rank launcher (`prank`)
    pub p2rank: PathBuf,

    /// Open Babel executable
    pub obabel: PathBuf,

    /// PDBFixer command line entry point
    pub pdbfixer: PathBuf,

    /// MGLTools python interpreter
    pub mgl_python: PathBuf,

    /// AutoDockTools `prepare_ligand4.py`
    pub prepare_ligand_script: PathBuf,

    /// AutoDockTools `prepare_receptor4.py`
    pub prepare_receptor_script: PathBuf,

    /// Intermediate files of preparation runs
    pub scratch_dir: PathBuf,

    /// Upper bound on one task (all of its tool calls together), in seconds
    pub task_timeout_secs: Option<u64>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            vina: PathBuf::from("vina"),
            autogrid: PathBuf::from("autogrid4"),
            autodock: PathBuf::from("autodock4"),
            p2rank: PathBuf::from("prank"),
            obabel: PathBuf::from("obabel"),
            pdbfixer: PathBuf::from("pdbfixer"),
            mgl_python: PathBuf::from("pythonsh"),
            prepare_ligand_script: PathBuf::from("prepare_ligand4.py"),
            prepare_receptor_script: PathBuf::from("prepare_receptor4.py"),
            scratch_dir: std::env::temp_dir().join("dockbatch"),
            task_timeout_secs: None,
        }
    }
}

impl ToolConfig {
    /// Load a JSON config file; missing fields keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `DOCKBATCH_*` environment variables
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides looked up by variable name
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let paths: [(&str, &mut PathBuf); 10] = [
            ("DOCKBATCH_VINA", &mut self.vina),
            ("DOCKBATCH_AUTOGRID", &mut self.autogrid),
            ("DOCKBATCH_AUTODOCK", &mut self.autodock),
            ("DOCKBATCH_P2RANK", &mut self.p2rank),
            ("DOCKBATCH_OBABEL", &mut self.obabel),
            ("DOCKBATCH_PDBFIXER", &mut self.pdbfixer),
            ("DOCKBATCH_MGL_PYTHON", &mut self.mgl_python),
            ("DOCKBATCH_PREPARE_LIGAND", &mut self.prepare_ligand_script),
            ("DOCKBATCH_PREPARE_RECEPTOR", &mut self.prepare_receptor_script),
            ("DOCKBATCH_SCRATCH_DIR", &mut self.scratch_dir),
        ];
        for (name, slot) in paths {
            if let Some(value) = lookup(name) {
                *slot = PathBuf::from(value);
            }
        }

        if let Some(value) = lookup("DOCKBATCH_TIMEOUT") {
            let secs = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "DOCKBATCH_TIMEOUT".to_string(),
                    value: value.clone(),
                })?;
            self.task_timeout_secs = Some(secs);
        }

        Ok(self)
    }

    /// Time budget of one task, shared by all of its tool calls; zero means none
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }
}
