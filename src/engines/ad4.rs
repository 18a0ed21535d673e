//! AutoDock4 engine: AutoGrid maps followed by a Lamarckian GA search

use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ToolConfig;
use crate::engines::{stage_inputs, DockingEngine, DockingError, LOG_TAIL_LINES};
use crate::io::{self, IoError, PoseRecord, AD4_COLUMNS};
use crate::process::{tail_lines, Deadline, ToolError, ToolInvocation};
use crate::task::{file_name, Center, DockingArgs};

const GRID_PARAMETERS: &str = "receptor.gpf";
const GRID_LOG: &str = "receptor.glg";
const GRID_FIELD: &str = "receptor.maps.fld";
const DOCKING_PARAMETERS: &str = "ligand.dpf";
const DOCKING_LOG: &str = "results.dlg";

/// One half of the AutoDock4 `seed` line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedValue {
    Pid,
    Time,
    Value(i64),
}

impl fmt::Display for SeedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedValue::Pid => write!(f, "pid"),
            SeedValue::Time => write!(f, "time"),
            SeedValue::Value(v) => write!(f, "{}", v),
        }
    }
}

/// Grid and genetic algorithm parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ad4Options {
    /// Grid points per axis
    pub grid_size: (u32, u32, u32),
    pub spacing: f64,
    pub dielectric: f64,
    pub smooth: f64,

    // Genetic algorithm
    pub ga_pop_size: u32,
    pub ga_num_evals: u64,
    pub ga_num_generations: u32,
    pub ga_elitism: u32,
    pub ga_mutation_rate: f64,
    pub ga_crossover_rate: f64,
    pub ga_run: u32,

    /// Clustering tolerance in Angstroms
    pub rmstol: f64,
    pub seed: (SeedValue, SeedValue),
}

impl Default for Ad4Options {
    fn default() -> Self {
        Self {
            grid_size: (60, 60, 60),
            spacing: 0.375,
            dielectric: -0.1465,
            smooth: 0.5,
            ga_pop_size: 150,
            ga_num_evals: 2_500_000,
            ga_num_generations: 27_000,
            ga_elitism: 1,
            ga_mutation_rate: 0.02,
            ga_crossover_rate: 0.8,
            ga_run: 10,
            rmstol: 2.0,
            seed: (SeedValue::Pid, SeedValue::Time),
        }
    }
}

/// Runs `autogrid4` then `autodock4` in the task directory
#[derive(Debug, Clone)]
pub struct Ad4Engine {
    autogrid: PathBuf,
    autodock: PathBuf,
    timeout: Option<Duration>,
    options: Ad4Options,
}

impl Ad4Engine {
    pub fn new(config: &ToolConfig, options: Ad4Options) -> Self {
        Self {
            autogrid: config.autogrid.clone(),
            autodock: config.autodock.clone(),
            timeout: config.task_timeout(),
            options,
        }
    }

    pub fn options(&self) -> &Ad4Options {
        &self.options
    }

    /// Grid parameter file for AutoGrid
    pub fn grid_parameters(
        &self,
        receptor_name: &str,
        receptor_types: &[String],
        ligand_types: &[String],
        center: &Center,
    ) -> String {
        let o = &self.options;
        let (nx, ny, nz) = o.grid_size;
        let mut gpf = String::new();

        gpf.push_str(&format!("npts {} {} {}\n", nx, ny, nz));
        gpf.push_str(&format!("gridfld {}\n", GRID_FIELD));
        gpf.push_str(&format!("spacing {}\n", o.spacing));
        gpf.push_str(&format!("receptor_types {}\n", receptor_types.join(" ")));
        gpf.push_str(&format!("ligand_types {}\n", ligand_types.join(" ")));
        gpf.push_str(&format!("receptor {}\n", receptor_name));
        gpf.push_str(&format!("gridcenter {} {} {}\n", center.x, center.y, center.z));
        gpf.push_str(&format!("smooth {}\n", o.smooth));
        push_maps(&mut gpf, ligand_types);
        gpf.push_str("elecmap receptor.e.map\n");
        gpf.push_str("dsolvmap receptor.d.map\n");
        gpf.push_str(&format!("dielectric {}\n", o.dielectric));
        gpf
    }

    /// Docking parameter file for AutoDock4
    pub fn docking_parameters(&self, ligand_name: &str, ligand_types: &[String]) -> String {
        let o = &self.options;
        let mut dpf = String::new();

        dpf.push_str("autodock_parameter_version 4.2\n");
        dpf.push_str("outlev 1\n");
        dpf.push_str("intelec\n");
        dpf.push_str(&format!("seed {} {}\n", o.seed.0, o.seed.1));
        dpf.push_str(&format!("ligand_types {}\n", ligand_types.join(" ")));
        dpf.push_str(&format!("fld {}\n", GRID_FIELD));
        push_maps(&mut dpf, ligand_types);
        dpf.push_str("elecmap receptor.e.map\n");
        dpf.push_str("desolvmap receptor.d.map\n");
        dpf.push_str(&format!("move {}\n\n", ligand_name));

        dpf.push_str(&format!("ga_pop_size {}\n", o.ga_pop_size));
        dpf.push_str(&format!("ga_num_evals {}\n", o.ga_num_evals));
        dpf.push_str(&format!("ga_num_generations {}\n", o.ga_num_generations));
        dpf.push_str(&format!("ga_elitism {}\n", o.ga_elitism));
        dpf.push_str(&format!("ga_mutation_rate {}\n", o.ga_mutation_rate));
        dpf.push_str(&format!("ga_crossover_rate {}\n", o.ga_crossover_rate));
        dpf.push_str("set_ga\n\n");

        // Solis-Wets local search
        dpf.push_str("sw_max_its 300\n");
        dpf.push_str("sw_max_succ 4\n");
        dpf.push_str("sw_max_fail 4\n");
        dpf.push_str("sw_rho 1.0\n");
        dpf.push_str("sw_lb_rho 0.01\n");
        dpf.push_str("ls_search_freq 0.06\n");
        dpf.push_str("set_psw1\n\n");

        dpf.push_str(&format!("ga_run {}\n", o.ga_run));
        dpf.push_str(&format!("rmstol {}\n", o.rmstol));
        dpf.push_str("analysis\n");
        dpf
    }

    /// Run one tool in `dir`; on failure prefer the tail of its own log
    fn run_step(
        &self,
        program: &Path,
        params: &str,
        log: &str,
        dir: &Path,
        deadline: Deadline,
    ) -> Result<(), DockingError> {
        let invocation = ToolInvocation::new(program)
            .args(["-p", params, "-l", log])
            .current_dir(dir)
            .within(deadline);
        let output = invocation.output()?;

        if output.success() {
            return Ok(());
        }

        let log_path = dir.join(log);
        match fs::read_to_string(&log_path) {
            Ok(text) if !text.trim().is_empty() => Err(DockingError::ToolLog {
                tool: invocation.tool_name(),
                log: log.to_string(),
                tail: tail_lines(&text, LOG_TAIL_LINES),
            }),
            _ => Err(ToolError::Failed {
                tool: invocation.tool_name(),
                status: output.status.to_string(),
                stderr: tail_lines(output.stderr.trim_end(), LOG_TAIL_LINES),
            }
            .into()),
        }
    }
}

fn push_maps(out: &mut String, ligand_types: &[String]) {
    for t in ligand_types {
        out.push_str(&format!("map receptor.{}.map\n", t));
    }
}

impl DockingEngine for Ad4Engine {
    fn name(&self) -> &'static str {
        "ad4"
    }

    fn summary_file_name(&self) -> &'static str {
        "ad4_summary.csv"
    }

    fn log_file_name(&self) -> &'static str {
        DOCKING_LOG
    }

    fn pose_columns(&self) -> &'static [&'static str] {
        AD4_COLUMNS
    }

    fn dock(&self, args: &DockingArgs, cpu: usize, out_dir: &Path) -> Result<PathBuf, DockingError> {
        // autogrid4 and autodock4 share one budget
        let deadline = Deadline::after(self.timeout);
        let (receptor, ligand) = stage_inputs(args, out_dir)?;
        // autodock4 is single threaded
        debug!("AD4 docking in {} (CPU share {} unused)", out_dir.display(), cpu);

        let receptor_types = io::detect_atom_types(&receptor)?;
        let ligand_types = io::detect_atom_types(&ligand)?;

        let gpf = self.grid_parameters(&file_name(&receptor), &receptor_types, &ligand_types, &args.center);
        fs::write(out_dir.join(GRID_PARAMETERS), gpf)?;
        self.run_step(&self.autogrid, GRID_PARAMETERS, GRID_LOG, out_dir, deadline)?;

        let fld = out_dir.join(GRID_FIELD);
        if !fld.exists() {
            return Err(DockingError::MissingOutput(fld));
        }

        let dpf = self.docking_parameters(&file_name(&ligand), &ligand_types);
        fs::write(out_dir.join(DOCKING_PARAMETERS), dpf)?;
        self.run_step(&self.autodock, DOCKING_PARAMETERS, DOCKING_LOG, out_dir, deadline)?;

        let dlg = out_dir.join(DOCKING_LOG);
        if !dlg.exists() {
            return Err(DockingError::MissingOutput(dlg));
        }

        let models = io::extract_models(&fs::read_to_string(&dlg)?);
        let written = io::write_models(&models, out_dir.join("output.pdbqt"))?;
        debug!("Extracted {} poses from {}", written, dlg.display());

        Ok(out_dir.to_path_buf())
    }

    fn parse_log(&self, out_dir: &Path) -> Result<Vec<PoseRecord>, IoError> {
        let text = fs::read_to_string(out_dir.join(DOCKING_LOG))?;
        let poses = io::parse_ad4_dlg(&text)?;
        Ok(poses.into_iter().map(PoseRecord::Ad4).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_grid_parameters() {
        let engine = Ad4Engine::new(&ToolConfig::default(), Ad4Options::default());
        let gpf = engine.grid_parameters(
            "rec.pdbqt",
            &types(&["A", "C", "OA"]),
            &types(&["C", "NA"]),
            &Center::new(10.5, 15.2, -20.0),
        );

        let lines: Vec<&str> = gpf.lines().collect();
        assert_eq!(lines[0], "npts 60 60 60");
        assert!(lines.contains(&"receptor_types A C OA"));
        assert!(lines.contains(&"ligand_types C NA"));
        assert!(lines.contains(&"receptor rec.pdbqt"));
        assert!(lines.contains(&"gridcenter 10.5 15.2 -20"));
        assert!(lines.contains(&"map receptor.C.map"));
        assert!(lines.contains(&"map receptor.NA.map"));
        assert_eq!(lines.last(), Some(&"dielectric -0.1465"));
    }

    #[test]
    fn test_docking_parameters() {
        let options = Ad4Options {
            ga_run: 50,
            seed: (SeedValue::Value(7), SeedValue::Time),
            ..Ad4Options::default()
        };
        let engine = Ad4Engine::new(&ToolConfig::default(), options);
        let dpf = engine.docking_parameters("lig.pdbqt", &types(&["C", "OA"]));

        let lines: Vec<&str> = dpf.lines().collect();
        assert_eq!(lines[0], "autodock_parameter_version 4.2");
        assert!(lines.contains(&"seed 7 time"));
        assert!(lines.contains(&"fld receptor.maps.fld"));
        assert!(lines.contains(&"map receptor.OA.map"));
        assert!(lines.contains(&"move lig.pdbqt"));
        assert!(lines.contains(&"ga_num_evals 2500000"));
        assert!(lines.contains(&"ga_run 50"));
        assert_eq!(lines.last(), Some(&"analysis"));
    }

    #[test]
    fn test_default_seed() {
        let engine = Ad4Engine::new(&ToolConfig::default(), Ad4Options::default());
        assert!(engine.docking_parameters("l.pdbqt", &[]).contains("seed pid time\n"));
    }

    #[test]
    fn test_rejects_non_pdbqt_ligand() {
        let dir = tempfile::tempdir().unwrap();
        let receptor = dir.path().join("rec.pdbqt");
        let ligand = dir.path().join("lig.sdf");
        fs::write(&receptor, "ATOM").unwrap();
        fs::write(&ligand, "mol").unwrap();

        let engine = Ad4Engine::new(&ToolConfig::default(), Ad4Options::default());
        let args = DockingArgs {
            receptor,
            ligand,
            center: Center::new(0.0, 0.0, 0.0),
        };

        let err = engine.dock(&args, 1, &dir.path().join("task")).unwrap_err();
        assert!(matches!(err, DockingError::InvalidInput(_)));
        assert!(!dir.path().join("task").exists());
    }
}
