//! AutoDock Vina engine

use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ToolConfig;
use crate::engines::{stage_inputs, DockingEngine, DockingError};
use crate::io::{self, IoError, PoseRecord, VINA_COLUMNS};
use crate::process::ToolInvocation;
use crate::task::{Center, DockingArgs};

/// Search parameters passed to Vina
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VinaOptions {
    /// Box edge lengths in Angstroms
    pub grid_size: (f64, f64, f64),
    pub exhaustiveness: u32,
    pub num_modes: u32,
    pub verbosity: u32,
    pub seed: Option<i64>,
}

impl Default for VinaOptions {
    fn default() -> Self {
        Self {
            grid_size: (20.0, 20.0, 20.0),
            exhaustiveness: 8,
            num_modes: 9,
            verbosity: 1,
            seed: None,
        }
    }
}

/// Runs the `vina` binary once per task
#[derive(Debug, Clone)]
pub struct VinaEngine {
    vina: PathBuf,
    timeout: Option<Duration>,
    options: VinaOptions,
}

impl VinaEngine {
    pub fn new(config: &ToolConfig, options: VinaOptions) -> Self {
        Self {
            vina: config.vina.clone(),
            timeout: config.task_timeout(),
            options,
        }
    }

    pub fn options(&self) -> &VinaOptions {
        &self.options
    }

    /// Command line for one docking run
    pub fn command(
        &self,
        receptor: &Path,
        ligand: &Path,
        center: &Center,
        cpu: usize,
        output: &Path,
    ) -> ToolInvocation {
        let (sx, sy, sz) = self.options.grid_size;
        let mut invocation = ToolInvocation::new(&self.vina)
            .arg("--receptor")
            .arg(receptor)
            .arg("--ligand")
            .arg(ligand)
            .args(["--center_x".to_string(), center.x.to_string()])
            .args(["--center_y".to_string(), center.y.to_string()])
            .args(["--center_z".to_string(), center.z.to_string()])
            .args(["--size_x".to_string(), sx.to_string()])
            .args(["--size_y".to_string(), sy.to_string()])
            .args(["--size_z".to_string(), sz.to_string()])
            .arg("--out")
            .arg(output)
            .args(["--exhaustiveness".to_string(), self.options.exhaustiveness.to_string()])
            .args(["--num_modes".to_string(), self.options.num_modes.to_string()])
            .args(["--cpu".to_string(), cpu.max(1).to_string()])
            .args(["--verbosity".to_string(), self.options.verbosity.to_string()])
            .timeout(self.timeout);

        if let Some(seed) = self.options.seed {
            invocation = invocation.args(["--seed".to_string(), seed.to_string()]);
        }
        invocation
    }
}

impl DockingEngine for VinaEngine {
    fn name(&self) -> &'static str {
        "vina"
    }

    fn summary_file_name(&self) -> &'static str {
        "vina_summary.csv"
    }

    fn log_file_name(&self) -> &'static str {
        "log.txt"
    }

    fn pose_columns(&self) -> &'static [&'static str] {
        VINA_COLUMNS
    }

    fn dock(&self, args: &DockingArgs, cpu: usize, out_dir: &Path) -> Result<PathBuf, DockingError> {
        let (receptor, ligand) = stage_inputs(args, out_dir)?;
        let output = out_dir.join("output.pdbqt");
        let log_file = out_dir.join(self.log_file_name());

        debug!("Vina docking in {} with {} CPUs", out_dir.display(), cpu);
        let result = self
            .command(&receptor, &ligand, &args.center, cpu, &output)
            .run()?;

        if !result.stdout.is_empty() {
            fs::write(&log_file, &result.stdout)?;
        }

        for required in [&output, &log_file] {
            if !required.exists() {
                return Err(DockingError::MissingOutput(required.clone()));
            }
        }

        Ok(out_dir.to_path_buf())
    }

    fn parse_log(&self, out_dir: &Path) -> Result<Vec<PoseRecord>, IoError> {
        let text = fs::read_to_string(out_dir.join(self.log_file_name()))?;
        let poses = io::parse_vina_log(&text)?;
        Ok(poses.into_iter().map(PoseRecord::Vina).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(invocation: &ToolInvocation) -> Vec<String> {
        invocation
            .arguments()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    fn value_after(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1).cloned())
    }

    #[test]
    fn test_command_line() {
        let engine = VinaEngine::new(&ToolConfig::default(), VinaOptions::default());
        let invocation = engine.command(
            Path::new("rec.pdbqt"),
            Path::new("lig.pdbqt"),
            &Center::new(1.5, -2.0, 3.25),
            4,
            Path::new("out/output.pdbqt"),
        );
        let args = args_of(&invocation);

        assert_eq!(invocation.tool_name(), "vina");
        assert_eq!(value_after(&args, "--center_x").as_deref(), Some("1.5"));
        assert_eq!(value_after(&args, "--center_y").as_deref(), Some("-2"));
        assert_eq!(value_after(&args, "--size_z").as_deref(), Some("20"));
        assert_eq!(value_after(&args, "--cpu").as_deref(), Some("4"));
        assert_eq!(value_after(&args, "--num_modes").as_deref(), Some("9"));
        assert!(!args.contains(&"--seed".to_string()));
    }

    #[test]
    fn test_seed_is_forwarded() {
        let options = VinaOptions {
            seed: Some(42),
            ..VinaOptions::default()
        };
        let engine = VinaEngine::new(&ToolConfig::default(), options);
        let invocation = engine.command(
            Path::new("r.pdbqt"),
            Path::new("l.pdbqt"),
            &Center::new(0.0, 0.0, 0.0),
            1,
            Path::new("o.pdbqt"),
        );
        assert_eq!(value_after(&args_of(&invocation), "--seed").as_deref(), Some("42"));
    }

    #[test]
    fn test_parse_log_reads_task_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("log.txt"),
            "-----+------------+----------+----------\n   1       -8.1          0          0\n",
        )
        .unwrap();

        let engine = VinaEngine::new(&ToolConfig::default(), VinaOptions::default());
        let poses = engine.parse_log(dir.path()).unwrap();
        assert_eq!(poses.len(), 1);
        assert_eq!(poses[0].energy(), -8.1);
    }

    #[test]
    fn test_missing_binary_is_a_task_error() {
        let dir = tempfile::tempdir().unwrap();
        let receptor = dir.path().join("rec.pdbqt");
        let ligand = dir.path().join("lig.pdbqt");
        fs::write(&receptor, "ATOM").unwrap();
        fs::write(&ligand, "ATOM").unwrap();

        let config = ToolConfig {
            vina: PathBuf::from("/nonexistent/vina"),
            ..ToolConfig::default()
        };
        let engine = VinaEngine::new(&config, VinaOptions::default());
        let args = DockingArgs {
            receptor,
            ligand,
            center: Center::new(0.0, 0.0, 0.0),
        };

        let err = engine.dock(&args, 1, &dir.path().join("task")).unwrap_err();
        assert!(matches!(err, DockingError::Tool(_)));
    }
}
