//! Main executable for rustdock-batch

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustdock_batch::allocator::available_cpus;
use rustdock_batch::batch::{collect_inputs, receptor_centers, PrepStatus};
use rustdock_batch::engines::{Ad4Options, SeedValue, VinaOptions};
use rustdock_batch::pocket::{PocketFinder, STRUCTURE_EXTENSIONS};
use rustdock_batch::prep::ligand::LIGAND_EXTENSIONS;
use rustdock_batch::prep::protein::PROTEIN_EXTENSIONS;
use rustdock_batch::prep::{Minimize, PrepOptions};
use rustdock_batch::task::ReceptorCenters;
use rustdock_batch::{
    Ad4Engine, BatchDocking, BatchPocketFinder, BatchPreparation, Center, DockingEngine, OutcomeMap,
    TaskKey, ToolConfig, VinaEngine,
};

/// Command-line arguments for the application
#[derive(Parser, Debug)]
#[clap(
    name = "dockbatch",
    version = rustdock_batch::VERSION,
    about = "Run structure preparation, pocket prediction and docking in parallel batches"
)]
struct Cli {
    /// JSON file with tool locations (see ToolConfig)
    #[clap(long, short, global = true, value_parser)]
    config: Option<PathBuf>,

    /// Total CPU budget shared by all workers (default: all cores)
    #[clap(long, global = true)]
    cpu: Option<usize>,

    /// Kill any single tool run after this many seconds
    #[clap(long, global = true)]
    timeout: Option<u64>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Engine {
    Vina,
    Ad4,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert ligands to PDBQT
    PrepareLigands {
        /// Ligand files, or one directory containing them
        #[clap(required = true, value_parser)]
        inputs: Vec<PathBuf>,

        /// Directory for the prepared PDBQT files
        #[clap(long, short, default_value = "prepared_ligands")]
        out: PathBuf,

        /// Forcefield for Open Babel minimization (mmff94, mmff94s, uff, gaff)
        #[clap(long, default_value = "none")]
        minimize: Minimize,

        /// Keep water molecules
        #[clap(long)]
        keep_water: bool,

        /// Do not add hydrogens
        #[clap(long)]
        no_hydrogens: bool,

        /// Keep input charges instead of assigning Gasteiger charges
        #[clap(long)]
        keep_charges: bool,

        /// Atom types whose input charges are preserved
        #[clap(long = "preserve-charge", value_name = "TYPE")]
        preserve_charge_types: Vec<String>,
    },

    /// Clean proteins and convert them to PDBQT
    PrepareProteins {
        /// Protein files, or one directory containing them
        #[clap(required = true, value_parser)]
        inputs: Vec<PathBuf>,

        /// Directory for the prepared PDBQT files
        #[clap(long, short, default_value = "prepared_proteins")]
        out: PathBuf,

        /// Skip PDBFixer repair of missing residues and atoms
        #[clap(long)]
        no_fix: bool,

        /// Keep ligands and other heterogens
        #[clap(long)]
        keep_heterogens: bool,

        /// Keep water molecules
        #[clap(long)]
        keep_water: bool,

        /// Do not add hydrogens
        #[clap(long)]
        no_hydrogens: bool,

        /// Keep input charges instead of assigning Gasteiger charges
        #[clap(long)]
        keep_charges: bool,

        /// Atom types whose input charges are preserved
        #[clap(long = "preserve-charge", value_name = "TYPE")]
        preserve_charge_types: Vec<String>,
    },

    /// Predict binding pockets with P2Rank
    FindPockets {
        /// Structure files (.pdb, .pdbqt), or one directory containing them
        #[clap(required = true, value_parser)]
        inputs: Vec<PathBuf>,

        /// Output directory for the P2Rank reports
        #[clap(long, short, default_value = "pockets")]
        out: PathBuf,
    },

    /// Dock every ligand at every pocket center of every receptor
    Dock {
        /// Docking engine
        #[clap(long, value_enum, default_value = "vina")]
        engine: Engine,

        /// Receptor PDBQT files
        #[clap(long = "receptor", required = true, value_parser)]
        receptors: Vec<PathBuf>,

        /// Ligand PDBQT files, or one directory containing them
        #[clap(long = "ligand", required = true, value_parser)]
        ligands: Vec<PathBuf>,

        /// Pocket center (x,y,z) applied to every receptor; repeatable
        #[clap(long = "center", allow_hyphen_values = true)]
        centers: Vec<Center>,

        /// JSON file mapping receptor paths to lists of [x, y, z] centers
        #[clap(long, value_parser)]
        centers_file: Option<PathBuf>,

        /// Predict pocket centers with P2Rank before docking
        #[clap(long)]
        pockets: bool,

        /// Dock only the best ranked N predicted pockets of each receptor
        #[clap(long)]
        max_pockets: Option<usize>,

        /// Output directory for the docking results
        #[clap(long, short, default_value = "batch_docking_results")]
        out: PathBuf,

        /// Size of the search box (x,y,z): Angstroms for Vina, grid points for AD4
        #[clap(long, value_parser, value_delimiter = ',')]
        size: Option<Vec<f64>>,

        /// Exhaustiveness of the Vina search
        #[clap(long, default_value_t = 8)]
        exhaustiveness: u32,

        /// Number of Vina binding modes to generate
        #[clap(long, default_value_t = 9)]
        num_modes: u32,

        /// Random seed
        #[clap(long)]
        seed: Option<i64>,

        /// Number of AD4 genetic algorithm runs
        #[clap(long, default_value_t = 10)]
        ga_run: u32,
    },
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    // Parse command-line arguments
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.timeout)?;
    let cpu = cli.cpu.unwrap_or_else(available_cpus);

    match cli.command {
        Commands::PrepareLigands {
            inputs,
            out,
            minimize,
            keep_water,
            no_hydrogens,
            keep_charges,
            preserve_charge_types,
        } => {
            let files = collect_inputs(&inputs, LIGAND_EXTENSIONS)?;
            let options = PrepOptions {
                minimize,
                remove_water: !keep_water,
                add_hydrogens: !no_hydrogens,
                add_charges: !keep_charges,
                preserve_charge_types: non_empty(preserve_charge_types),
                ..PrepOptions::default()
            };

            let records = BatchPreparation::ligands(files, &config, options)
                .prepare_all(cpu, &out)
                .context("Ligand preparation failed")?;
            report_preparation(&records);
        }

        Commands::PrepareProteins {
            inputs,
            out,
            no_fix,
            keep_heterogens,
            keep_water,
            no_hydrogens,
            keep_charges,
            preserve_charge_types,
        } => {
            let files = collect_inputs(&inputs, PROTEIN_EXTENSIONS)?;
            let options = PrepOptions {
                fix_pdb: !no_fix,
                remove_heterogens: !keep_heterogens,
                remove_water: !keep_water,
                add_hydrogens: !no_hydrogens,
                add_charges: !keep_charges,
                preserve_charge_types: non_empty(preserve_charge_types),
                ..PrepOptions::default()
            };

            let records = BatchPreparation::proteins(files, &config, options)
                .prepare_all(cpu, &out)
                .context("Protein preparation failed")?;
            report_preparation(&records);
        }

        Commands::FindPockets { inputs, out } => {
            let files = collect_inputs(&inputs, STRUCTURE_EXTENSIONS)?;
            let outcomes = BatchPocketFinder::new(files, PocketFinder::new(&config))
                .run_all(cpu, &out)
                .context("Pocket prediction failed")?;

            for (structure, report) in outcomes.successes() {
                info!("{}: {} pockets", structure, report.pockets.len());
            }
        }

        Commands::Dock {
            engine,
            receptors,
            ligands,
            centers,
            centers_file,
            pockets,
            max_pockets,
            out,
            size,
            exhaustiveness,
            num_modes,
            seed,
            ga_run,
        } => {
            let ligands = collect_inputs(&ligands, &["pdbqt"])?;
            let receptors = collect_inputs(&receptors, &["pdbqt"])?;

            let mut receptor_map: ReceptorCenters = Vec::new();
            if !centers.is_empty() {
                receptor_map.extend(receptors.iter().map(|r| (r.clone(), centers.clone())));
            }
            if let Some(path) = centers_file {
                receptor_map.extend(read_centers_file(&path)?);
            }
            if pockets {
                let outcomes = BatchPocketFinder::new(receptors.clone(), PocketFinder::new(&config))
                    .run_all(cpu, &out.join("pockets"))
                    .context("Pocket prediction failed")?;
                receptor_map.extend(receptor_centers(&outcomes, max_pockets));
            }
            if receptor_map.is_empty() {
                bail!("No pocket centers: use --center, --centers-file or --pockets");
            }

            let size = match size.as_deref() {
                None => None,
                Some([x, y, z]) => Some((*x, *y, *z)),
                Some(_) => bail!("--size needs exactly three values"),
            };

            let engine: Arc<dyn DockingEngine> = match engine {
                Engine::Vina => {
                    let defaults = VinaOptions::default();
                    Arc::new(VinaEngine::new(
                        &config,
                        VinaOptions {
                            grid_size: size.unwrap_or(defaults.grid_size),
                            exhaustiveness,
                            num_modes,
                            seed,
                            ..defaults
                        },
                    ))
                }
                Engine::Ad4 => {
                    let defaults = Ad4Options::default();
                    let grid_size = match size {
                        Some((x, y, z)) => (x.round() as u32, y.round() as u32, z.round() as u32),
                        None => defaults.grid_size,
                    };
                    let seed = match seed {
                        Some(value) => (SeedValue::Value(value), SeedValue::Time),
                        None => defaults.seed,
                    };
                    Arc::new(Ad4Engine::new(
                        &config,
                        Ad4Options {
                            grid_size,
                            ga_run,
                            seed,
                            ..defaults
                        },
                    ))
                }
            };

            let batch = BatchDocking::new(receptor_map, ligands, engine);
            let outcomes = batch
                .run_all(cpu, &out)
                .with_context(|| format!("Docking batch in {} failed", out.display()))?;
            report_docking(&outcomes, &out, batch.engine());
        }
    }

    Ok(())
}

/// Tool configuration from the optional file, then the environment, then flags
fn load_config(path: Option<&Path>, timeout: Option<u64>) -> Result<ToolConfig> {
    let config = match path {
        Some(path) => ToolConfig::from_file(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => ToolConfig::default(),
    };

    let mut config = config
        .with_env()
        .context("Invalid DOCKBATCH_* environment variable")?;
    if timeout.is_some() {
        config.task_timeout_secs = timeout;
    }
    Ok(config)
}

fn read_centers_file(path: &Path) -> Result<ReceptorCenters> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read centers file: {}", path.display()))?;
    let entries: BTreeMap<PathBuf, Vec<[f64; 3]>> = serde_json::from_str(&text)
        .with_context(|| format!("Invalid centers file: {}", path.display()))?;

    Ok(entries
        .into_iter()
        .map(|(receptor, centers)| {
            let centers = centers
                .into_iter()
                .map(|[x, y, z]| Center::new(x, y, z))
                .collect();
            (receptor, centers)
        })
        .collect())
}

fn non_empty(types: Vec<String>) -> Option<Vec<String>> {
    (!types.is_empty()).then_some(types)
}

fn report_preparation(records: &[rustdock_batch::batch::PrepRecord]) {
    let failed = records
        .iter()
        .filter(|r| r.status == PrepStatus::Error)
        .count();
    if failed > 0 {
        warn!("{} of {} inputs failed to prepare", failed, records.len());
    }
}

fn report_docking(outcomes: &OutcomeMap<TaskKey, PathBuf>, out: &Path, engine: &dyn DockingEngine) {
    let summary = outcomes.summary();
    info!(
        "{} of {} docking tasks succeeded, summary in {}",
        summary.succeeded,
        summary.total,
        out.join(engine.summary_file_name()).display()
    );
    for (key, message) in outcomes.failures() {
        warn!("{} failed: {}", key, message);
    }
}
