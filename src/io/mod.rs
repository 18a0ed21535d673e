//! Input/output functionality for docking artifacts
//!
//! Covers the few file formats the batch layer has to read or write itself:
//! atom-type columns of PDBQT files, Vina logs, AutoDock4 DLG files and the
//! combined CSV summary.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::task::TaskKey;

/// Errors that can occur during file I/O operations
#[derive(Error, Debug)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// One ranked pose from an AutoDock Vina log
#[derive(Debug, Clone, PartialEq)]
pub struct VinaPose {
    pub mode: u32,
    pub affinity: f64,
    pub rmsd_lb: f64,
    pub rmsd_ub: f64,
}

/// One row of the RMSD table of an AutoDock4 DLG file
#[derive(Debug, Clone, PartialEq)]
pub struct Ad4Pose {
    pub cluster_rank: u32,
    pub sub_rank: u32,
    pub run: u32,
    pub binding_energy: f64,
    pub cluster_rmsd: f64,
    pub reference_rmsd: f64,
}

/// A pose parsed from an engine log
#[derive(Debug, Clone, PartialEq)]
pub enum PoseRecord {
    Vina(VinaPose),
    Ad4(Ad4Pose),
}

/// Summary columns contributed by Vina poses
pub const VINA_COLUMNS: &[&str] = &["pose", "affinity_kcal_mol", "rmsd_lb", "rmsd_ub"];

/// Summary columns contributed by AutoDock4 poses
pub const AD4_COLUMNS: &[&str] = &[
    "cluster_rank",
    "sub_rank",
    "run",
    "binding_energy_kcal_mol",
    "cluster_rmsd",
    "reference_rmsd",
];

/// Columns identifying the originating task
pub const KEY_COLUMNS: &[&str] = &["receptor", "ligand", "center_x", "center_y", "center_z"];

impl PoseRecord {
    /// Score used for ranking, in kcal/mol
    pub fn energy(&self) -> f64 {
        match self {
            PoseRecord::Vina(p) => p.affinity,
            PoseRecord::Ad4(p) => p.binding_energy,
        }
    }

    fn values(&self) -> Vec<String> {
        match self {
            PoseRecord::Vina(p) => vec![
                p.mode.to_string(),
                p.affinity.to_string(),
                p.rmsd_lb.to_string(),
                p.rmsd_ub.to_string(),
            ],
            PoseRecord::Ad4(p) => vec![
                p.cluster_rank.to_string(),
                p.sub_rank.to_string(),
                p.run.to_string(),
                p.binding_energy.to_string(),
                p.cluster_rmsd.to_string(),
                p.reference_rmsd.to_string(),
            ],
        }
    }
}

/// Parse the result table printed by AutoDock Vina
///
/// ```text
/// mode |   affinity | dist from best mode
///      | (kcal/mol) | rmsd l.b.| rmsd u.b.
/// -----+------------+----------+----------
///    1       -7.339          0          0
/// ```
pub fn parse_vina_log(text: &str) -> Result<Vec<VinaPose>, IoError> {
    let mut lines = text.lines().enumerate();

    if !lines.any(|(_, line)| line.trim_start().starts_with("-----+")) {
        return Err(IoError::InvalidFormat(
            "Vina result table not found".to_string(),
        ));
    }

    let mut poses = Vec::new();
    for (idx, line) in lines {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 4 {
            break;
        }

        let number = |i: usize| -> Result<f64, IoError> {
            parts[i].parse::<f64>().map_err(|_| IoError::Parse {
                line: idx + 1,
                message: format!("Invalid number '{}' in Vina result table", parts[i]),
            })
        };

        let Ok(mode) = parts[0].parse::<u32>() else {
            break;
        };
        poses.push(VinaPose {
            mode,
            affinity: number(1)?,
            rmsd_lb: number(2)?,
            rmsd_ub: number(3)?,
        });
    }

    if poses.is_empty() {
        return Err(IoError::InvalidFormat(
            "Vina result table is empty".to_string(),
        ));
    }

    Ok(poses)
}

/// Parse the RMSD table of an AutoDock4 DLG file (rows tagged `RANKING`)
pub fn parse_ad4_dlg(text: &str) -> Result<Vec<Ad4Pose>, IoError> {
    let mut poses = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 7 || parts.last() != Some(&"RANKING") {
            continue;
        }

        let err = |what: &str, value: &str| IoError::Parse {
            line: idx + 1,
            message: format!("Invalid {} '{}' in RMSD table", what, value),
        };
        let int = |i: usize, what: &str| parts[i].parse::<u32>().map_err(|_| err(what, parts[i]));
        let float = |i: usize, what: &str| parts[i].parse::<f64>().map_err(|_| err(what, parts[i]));

        poses.push(Ad4Pose {
            cluster_rank: int(0, "rank")?,
            sub_rank: int(1, "sub-rank")?,
            run: int(2, "run")?,
            binding_energy: float(3, "binding energy")?,
            cluster_rmsd: float(4, "cluster RMSD")?,
            reference_rmsd: float(5, "reference RMSD")?,
        });
    }

    if poses.is_empty() {
        return Err(IoError::InvalidFormat(
            "No RMSD table found in DLG file".to_string(),
        ));
    }

    Ok(poses)
}

/// Unique AutoDock atom types (columns 78-79) of a PDBQT file, sorted
pub fn detect_atom_types<P: AsRef<Path>>(path: P) -> Result<Vec<String>, IoError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut types = BTreeSet::new();

    for line in reader.lines() {
        let line = line?;
        if !(line.starts_with("ATOM") || line.starts_with("HETATM")) {
            continue;
        }

        let atom_type = line.get(77..79).or_else(|| line.get(77..)).unwrap_or("").trim();
        if !atom_type.is_empty() {
            types.insert(atom_type.to_string());
        }
    }

    if types.is_empty() {
        return Err(IoError::InvalidFormat(format!(
            "No atom records in {}",
            path.as_ref().display()
        )));
    }

    Ok(types.into_iter().collect())
}

/// MODEL ... ENDMDL blocks of a DLG file, each with its trailing newline
pub fn extract_models(text: &str) -> Vec<String> {
    let mut models = Vec::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        // DLG pose lines carry a "DOCKED: " prefix
        let record = line.strip_prefix("DOCKED: ").unwrap_or(line);

        if record.starts_with("MODEL") {
            current = Some(format!("{}\n", record));
        } else if let Some(model) = current.as_mut() {
            model.push_str(record);
            model.push('\n');
            if record.starts_with("ENDMDL") {
                if let Some(done) = current.take() {
                    models.push(done);
                }
            }
        }
    }

    models
}

/// Write extracted models into a multi-model PDBQT file.
///
/// Returns the number of models written; nothing is written when there are none.
pub fn write_models<P: AsRef<Path>>(models: &[String], path: P) -> Result<usize, IoError> {
    if models.is_empty() {
        return Ok(0);
    }

    let mut file = File::create(path)?;
    for model in models {
        file.write_all(model.as_bytes())?;
    }
    Ok(models.len())
}

/// Copy `file` into `dir`, keeping its name
pub fn copy_into(file: &Path, dir: &Path) -> Result<PathBuf, IoError> {
    let name = file
        .file_name()
        .ok_or_else(|| IoError::InvalidFormat(format!("Not a file: {}", file.display())))?;
    let target = dir.join(name);
    fs::copy(file, &target)?;
    Ok(target)
}

/// Write the combined pose table of a docking batch
///
/// Returns the number of data rows written.
pub fn write_summary<'a, P, I>(path: P, pose_columns: &[&str], rows: I) -> Result<usize, IoError>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = (&'a TaskKey, &'a PoseRecord)>,
{
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(KEY_COLUMNS.iter().chain(pose_columns.iter()))?;

    let mut count = 0;
    for (key, pose) in rows {
        let mut record = vec![
            key.receptor.clone(),
            key.ligand.clone(),
            key.center.x.to_string(),
            key.center.y.to_string(),
            key.center.z.to_string(),
        ];
        record.extend(pose.values());
        writer.write_record(&record)?;
        count += 1;
    }

    writer.flush()?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Center;
    use assert_approx_eq::assert_approx_eq;

    const VINA_LOG: &str = "\
AutoDock Vina v1.2.5
Scoring function : vina
Performing docking (random seed: 42) ... done.

mode |   affinity | dist from best mode
     | (kcal/mol) | rmsd l.b.| rmsd u.b.
-----+------------+----------+----------
   1       -7.339          0          0
   2       -7.165      1.851      2.638
   3       -6.902      2.012      4.117
";

    const DLG: &str = "\
DOCKED: MODEL        1
DOCKED: USER    Run = 1
DOCKED: ATOM      1  C1  LIG     1       1.000   2.000   3.000  0.00  0.00    +0.000 C
DOCKED: ENDMDL
DOCKED: MODEL        2
DOCKED: ATOM      1  C1  LIG     1       1.500   2.000   3.000  0.00  0.00    +0.000 C
DOCKED: ENDMDL
                                RMSD TABLE
_____|______|______|___________|_________|_________________|___________
   1      1      2      -6.52      0.00     45.33           RANKING
   1      2      1      -6.48      0.51     45.29           RANKING
   2      1      3      -5.10      0.00     40.02           RANKING
";

    #[test]
    fn test_parse_vina_log() {
        let poses = parse_vina_log(VINA_LOG).unwrap();
        assert_eq!(poses.len(), 3);
        assert_eq!(poses[0].mode, 1);
        assert_approx_eq!(poses[0].affinity, -7.339);
        assert_approx_eq!(poses[1].rmsd_ub, 2.638);
    }

    #[test]
    fn test_parse_vina_log_stops_after_table() {
        let text = format!("{}Writing output ... done.\n", VINA_LOG);
        assert_eq!(parse_vina_log(&text).unwrap().len(), 3);
    }

    #[test]
    fn test_parse_vina_log_without_table() {
        assert!(matches!(
            parse_vina_log("Error: could not open receptor"),
            Err(IoError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_parse_ad4_dlg() {
        let poses = parse_ad4_dlg(DLG).unwrap();
        assert_eq!(poses.len(), 3);
        assert_eq!(poses[0].cluster_rank, 1);
        assert_eq!(poses[1].sub_rank, 2);
        assert_eq!(poses[2].run, 3);
        assert_approx_eq!(poses[2].binding_energy, -5.10);
        assert_approx_eq!(poses[0].reference_rmsd, 45.33);
    }

    #[test]
    fn test_parse_ad4_dlg_without_table() {
        assert!(parse_ad4_dlg("AutoDock 4.2 failed").is_err());
    }

    #[test]
    fn test_extract_models() {
        let models = extract_models(DLG);
        assert_eq!(models.len(), 2);
        assert!(models[0].starts_with("MODEL"));
        assert!(models[0].trim_end().ends_with("ENDMDL"));
        assert!(!models[1].contains("DOCKED:"));
    }

    #[test]
    fn test_detect_atom_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lig.pdbqt");
        std::fs::write(
            &path,
            "\
REMARK  test
ATOM      1  C1  LIG     1       1.000   2.000   3.000  0.00  0.00    +0.000 C
ATOM      2  O1  LIG     1       1.500   2.000   3.000  0.00  0.00    -0.300 OA
HETATM    3  N1  LIG     1       2.000   2.000   3.000  0.00  0.00    -0.200 NA
ATOM      4  C2  LIG     1       2.500   2.000   3.000  0.00  0.00    +0.000 C
",
        )
        .unwrap();

        assert_eq!(detect_atom_types(&path).unwrap(), vec!["C", "NA", "OA"]);
    }

    #[test]
    fn test_write_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vina_summary.csv");
        let key = TaskKey::new("rec.pdbqt", "lig.pdbqt", Center::new(1.0, 2.0, 3.0));
        let poses: Vec<PoseRecord> = parse_vina_log(VINA_LOG)
            .unwrap()
            .into_iter()
            .map(PoseRecord::Vina)
            .collect();

        let written = write_summary(&path, VINA_COLUMNS, poses.iter().map(|p| (&key, p))).unwrap();
        assert_eq!(written, 3);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.get(0), Some("receptor"));
        assert_eq!(headers.get(6), Some("affinity_kcal_mol"));

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get(1), Some("lig.pdbqt"));
        assert_eq!(rows[2].get(6), Some("-6.902"));
    }
}
