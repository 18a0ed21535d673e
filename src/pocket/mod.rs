//! Binding pocket prediction with P2Rank

use csv::{ReaderBuilder, Trim};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::config::ToolConfig;
use crate::process::{ToolError, ToolInvocation};
use crate::progress::{describe_path, Artifact};
use crate::task::{file_name, Center};

/// Structure formats P2Rank accepts
pub const STRUCTURE_EXTENSIONS: &[&str] = &["pdb", "pdbqt"];

/// Errors that can occur during pocket prediction
#[derive(Error, Debug)]
pub enum PocketError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Prediction CSV not found: {0}")]
    MissingReport(PathBuf),

    #[error("Failed to read prediction CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Error parsing coordinates at row {row}: {source}")]
    BadRow {
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error("No pocket centers found in {0}")]
    NoPockets(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A predicted pocket; rank 1 is the most confident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pocket {
    pub rank: usize,
    pub center: Center,
}

/// Pockets predicted for one structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PocketReport {
    pub structure: PathBuf,
    pub output_dir: PathBuf,
    pub pockets: Vec<Pocket>,
}

impl PocketReport {
    /// Pocket centers in rank order
    pub fn centers(&self) -> Vec<Center> {
        self.pockets.iter().map(|p| p.center).collect()
    }
}

impl Artifact for PocketReport {
    fn describe(&self) -> String {
        format!(
            "{} pockets in {}",
            self.pockets.len(),
            describe_path(&self.output_dir)
        )
    }
}

// Only the center columns matter; the rest of the row is ignored
#[derive(Debug, Deserialize)]
struct PredictionRow {
    center_x: f64,
    center_y: f64,
    center_z: f64,
}

/// Runs `prank predict` on one structure at a time
#[derive(Debug, Clone)]
pub struct PocketFinder {
    p2rank: PathBuf,
    timeout: Option<Duration>,
}

impl PocketFinder {
    pub fn new(config: &ToolConfig) -> Self {
        Self {
            p2rank: config.p2rank.clone(),
            timeout: config.task_timeout(),
        }
    }

    /// Command line for one prediction
    pub fn command(&self, structure: &Path, cpu: usize, save_to: &Path) -> ToolInvocation {
        ToolInvocation::new(&self.p2rank)
            .arg("predict")
            .arg("-f")
            .arg(structure)
            .arg("-o")
            .arg(save_to)
            .args(["-threads".to_string(), cpu.max(1).to_string()])
            .timeout(self.timeout)
    }

    /// Predict pockets of `structure`, writing the P2Rank report into `save_to`
    pub fn find(&self, structure: &Path, cpu: usize, save_to: &Path) -> Result<PocketReport, PocketError> {
        validate_structure(structure)?;
        fs::create_dir_all(save_to)?;

        self.command(structure, cpu, save_to).run()?;

        let report = save_to.join(format!("{}_predictions.csv", file_name(structure)));
        let pockets = parse_predictions(&report)?;

        info!("Found {} pockets for {}", pockets.len(), file_name(structure));
        for pocket in &pockets {
            debug!("Pocket {} center: {}", pocket.rank, pocket.center);
        }

        Ok(PocketReport {
            structure: structure.to_path_buf(),
            output_dir: save_to.to_path_buf(),
            pockets,
        })
    }
}

fn validate_structure(structure: &Path) -> Result<(), PocketError> {
    if !structure.is_file() {
        return Err(PocketError::InvalidInput(format!(
            "Structure file not found: {}",
            structure.display()
        )));
    }

    let supported = structure
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| STRUCTURE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    if !supported {
        return Err(PocketError::InvalidInput(format!(
            "Unsupported structure format (expected .pdb or .pdbqt): {}",
            structure.display()
        )));
    }
    Ok(())
}

/// Parse a P2Rank `*_predictions.csv` report
///
/// Headers and values are padded with spaces in P2Rank output, so both are
/// trimmed. Rank is the 1-based row position.
pub fn parse_predictions(path: &Path) -> Result<Vec<Pocket>, PocketError> {
    if !path.is_file() {
        return Err(PocketError::MissingReport(path.to_path_buf()));
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|source| PocketError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    let mut pockets = Vec::new();
    for (idx, row) in reader.deserialize::<PredictionRow>().enumerate() {
        let rank = idx + 1;
        let row = row.map_err(|source| PocketError::BadRow { row: rank, source })?;
        pockets.push(Pocket {
            rank,
            center: Center::new(row.center_x, row.center_y, row.center_z),
        });
    }

    if pockets.is_empty() {
        return Err(PocketError::NoPockets(path.to_path_buf()));
    }

    Ok(pockets)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREDICTIONS: &str = "\
name     ,rank, score, probability, sas_points, surf_atoms,   center_x,   center_y,   center_z, residue_ids, surf_atom_ids
pocket1  ,   1, 12.35,       0.712,        102,         54,    10.5012,    -3.2500,    22.0000, A_12 A_15, 101 102
pocket2  ,   2,  4.01,       0.203,         40,         21,     1.0000,     2.0000,     3.0000, A_88, 501
";

    #[test]
    fn test_parse_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.pdb_predictions.csv");
        fs::write(&path, PREDICTIONS).unwrap();

        let pockets = parse_predictions(&path).unwrap();
        assert_eq!(pockets.len(), 2);
        assert_eq!(pockets[0].rank, 1);
        assert_eq!(pockets[0].center, Center::new(10.5012, -3.25, 22.0));
        assert_eq!(pockets[1].rank, 2);
    }

    #[test]
    fn test_header_only_report_has_no_pockets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, PREDICTIONS.lines().next().unwrap()).unwrap();

        assert!(matches!(
            parse_predictions(&path),
            Err(PocketError::NoPockets(_))
        ));
    }

    #[test]
    fn test_bad_coordinate_reports_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(
            &path,
            "name,center_x,center_y,center_z\npocket1,1.0,2.0,3.0\npocket2,1.0,abc,3.0\n",
        )
        .unwrap();

        match parse_predictions(&path) {
            Err(PocketError::BadRow { row, .. }) => assert_eq!(row, 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_report() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            parse_predictions(&dir.path().join("nope.csv")),
            Err(PocketError::MissingReport(_))
        ));
    }

    #[test]
    fn test_rejects_unsupported_structure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.cif");
        fs::write(&path, "data_").unwrap();

        let finder = PocketFinder::new(&ToolConfig::default());
        let err = finder.find(&path, 1, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, PocketError::InvalidInput(_)));
    }

    #[test]
    fn test_command_line() {
        let finder = PocketFinder::new(&ToolConfig::default());
        let invocation = finder.command(Path::new("rec.pdb"), 3, Path::new("rec_pockets"));
        let args: Vec<String> = invocation
            .arguments()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["predict", "-f", "rec.pdb", "-o", "rec_pockets", "-threads", "3"]
        );
    }

    #[test]
    fn test_report_centers_and_description() {
        let report = PocketReport {
            structure: PathBuf::from("rec.pdb"),
            output_dir: PathBuf::from("out/rec_pockets"),
            pockets: vec![
                Pocket {
                    rank: 1,
                    center: Center::new(1.0, 2.0, 3.0),
                },
                Pocket {
                    rank: 2,
                    center: Center::new(4.0, 5.0, 6.0),
                },
            ],
        };
        assert_eq!(
            report.centers(),
            vec![Center::new(1.0, 2.0, 3.0), Center::new(4.0, 5.0, 6.0)]
        );
        assert_eq!(report.describe(), "2 pockets in rec_pockets");
    }
}
