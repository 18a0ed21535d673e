//! Structure preparation: ligands and proteins to PDBQT

pub mod ligand;
pub mod protein;

pub use ligand::LigandPreparer;
pub use protein::ProteinPreparer;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::process::ToolError;
use crate::task::file_stem;

/// Errors that can occur while preparing a structure
#[derive(Error, Debug)]
pub enum PrepError {
    #[error("Input file not found: {0}")]
    MissingInput(PathBuf),

    #[error("Unsupported file format '.{extension}'. Supported formats: {supported}")]
    UnsupportedFormat {
        extension: String,
        supported: String,
    },

    #[error("Unsupported forcefield '{0}'. Supported: mmff94, mmff94s, uff, gaff")]
    UnsupportedForcefield(String),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Expected output {0} was not produced")]
    MissingOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Open Babel forcefield used for ligand minimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Minimize {
    #[default]
    None,
    Mmff94,
    Mmff94s,
    Uff,
    Gaff,
}

impl Minimize {
    /// Value passed to `obabel --ff`, `None` when minimization is off
    pub fn forcefield(&self) -> Option<&'static str> {
        match self {
            Minimize::None => None,
            Minimize::Mmff94 => Some("mmff94"),
            Minimize::Mmff94s => Some("mmff94s"),
            Minimize::Uff => Some("uff"),
            Minimize::Gaff => Some("gaff"),
        }
    }
}

impl fmt::Display for Minimize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.forcefield().unwrap_or("none"))
    }
}

impl FromStr for Minimize {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Minimize::None),
            "mmff94" => Ok(Minimize::Mmff94),
            "mmff94s" => Ok(Minimize::Mmff94s),
            "uff" => Ok(Minimize::Uff),
            "gaff" => Ok(Minimize::Gaff),
            other => Err(PrepError::UnsupportedForcefield(other.to_string())),
        }
    }
}

/// Options shared by ligand and protein preparation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepOptions {
    /// Ligands only
    pub minimize: Minimize,
    pub remove_water: bool,
    pub add_hydrogens: bool,
    /// Assign Gasteiger charges; when false all input charges are kept
    pub add_charges: bool,
    /// Atom types whose input charges are kept while charging the rest
    pub preserve_charge_types: Option<Vec<String>>,
    /// Proteins only: rebuild missing residues and atoms with PDBFixer
    pub fix_pdb: bool,
    /// Proteins only: drop heterogens (water is kept for the water flag)
    pub remove_heterogens: bool,
}

impl Default for PrepOptions {
    fn default() -> Self {
        Self {
            minimize: Minimize::None,
            remove_water: true,
            add_hydrogens: true,
            add_charges: true,
            preserve_charge_types: None,
            fix_pdb: true,
            remove_heterogens: true,
        }
    }
}

impl PrepOptions {
    /// `-C` or `-p TYPE` flags of the AutoDockTools scripts
    pub(crate) fn charge_args(&self) -> Vec<String> {
        if !self.add_charges {
            return vec!["-C".to_string()];
        }

        self.preserve_charge_types
            .iter()
            .flatten()
            .flat_map(|t| ["-p".to_string(), t.clone()])
            .collect()
    }
}

/// Converts one input structure into a docking-ready PDBQT file
pub trait Preparer: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Extensions (lowercase, without the dot) this preparer accepts
    fn supported_extensions(&self) -> &'static [&'static str];

    /// Prepare `input`; `save_to` is a directory or a target file path
    fn prepare(&self, input: &Path, options: &PrepOptions, save_to: &Path) -> Result<PathBuf, PrepError>;
}

/// Lowercase extension of `input` if the preparer accepts it
pub(crate) fn check_input(input: &Path, supported: &[&str]) -> Result<String, PrepError> {
    if !input.is_file() {
        return Err(PrepError::MissingInput(input.to_path_buf()));
    }

    let extension = input
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if !supported.contains(&extension.as_str()) {
        return Err(PrepError::UnsupportedFormat {
            extension,
            supported: supported.join(", "),
        });
    }
    Ok(extension)
}

/// Absolute path of the prepared file: a path with an extension is used as
/// is, anything else is a directory receiving `<stem>.pdbqt`.
///
/// The MGLTools scripts run inside the scratch directory, so a relative
/// target would land there instead of under `save_to`.
pub(crate) fn resolve_output(input: &Path, save_to: &Path) -> Result<PathBuf, PrepError> {
    let (parent, name) = if save_to.extension().is_some() {
        let name = save_to
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| PrepError::MissingOutput(save_to.to_path_buf()))?;
        let parent = match save_to.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        (parent, name)
    } else {
        (save_to.to_path_buf(), format!("{}.pdbqt", file_stem(input)).into())
    };

    fs::create_dir_all(&parent)?;
    Ok(fs::canonicalize(&parent)?.join(name))
}

/// Fresh absolute directory under `scratch_root` for the intermediates of one run
pub(crate) fn scratch_dir(scratch_root: &Path, kind: &str, input: &Path) -> Result<PathBuf, PrepError> {
    let id = Uuid::new_v4().simple().to_string();
    let dir = scratch_root
        .join(kind)
        .join(format!("{}_{}", file_stem(input), &id[..8]));
    fs::create_dir_all(&dir)?;
    Ok(fs::canonicalize(&dir)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimize_parse() {
        assert_eq!("MMFF94s".parse::<Minimize>().unwrap(), Minimize::Mmff94s);
        assert_eq!("none".parse::<Minimize>().unwrap(), Minimize::None);
        assert!(matches!(
            "amber".parse::<Minimize>(),
            Err(PrepError::UnsupportedForcefield(_))
        ));
        assert_eq!(Minimize::Gaff.forcefield(), Some("gaff"));
    }

    #[test]
    fn test_charge_args() {
        let mut options = PrepOptions::default();
        assert!(options.charge_args().is_empty());

        options.preserve_charge_types = Some(vec!["Zn".to_string(), "Fe".to_string()]);
        assert_eq!(options.charge_args(), vec!["-p", "Zn", "-p", "Fe"]);

        // keeping every charge wins over a per-type list
        options.add_charges = false;
        assert_eq!(options.charge_args(), vec!["-C"]);
    }

    #[test]
    fn test_check_input() {
        let dir = tempfile::tempdir().unwrap();
        let sdf = dir.path().join("lig.SDF");
        let txt = dir.path().join("notes.txt");
        fs::write(&sdf, "").unwrap();
        fs::write(&txt, "").unwrap();

        assert_eq!(check_input(&sdf, &["sdf", "mol2"]).unwrap(), "sdf");
        assert!(matches!(
            check_input(&txt, &["sdf", "mol2"]),
            Err(PrepError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            check_input(&dir.path().join("gone.sdf"), &["sdf"]),
            Err(PrepError::MissingInput(_))
        ));
    }

    #[test]
    fn test_resolve_output() {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let input = Path::new("/data/aspirin.sdf");

        let into_dir = resolve_output(input, &dir.path().join("prepared")).unwrap();
        assert_eq!(into_dir, root.join("prepared").join("aspirin.pdbqt"));
        assert!(dir.path().join("prepared").is_dir());

        let explicit = resolve_output(input, &dir.path().join("out").join("lig1.pdbqt")).unwrap();
        assert_eq!(explicit, root.join("out").join("lig1.pdbqt"));
    }

    #[test]
    fn test_relative_output_is_made_absolute() {
        let name = format!("prep_out_{}", Uuid::new_v4().simple());
        let relative = Path::new("target").join(&name);

        let target = resolve_output(Path::new("lig.sdf"), &relative).unwrap();
        assert!(target.is_absolute());
        assert!(target.ends_with(relative.join("lig.pdbqt")));

        let explicit = resolve_output(Path::new("lig.sdf"), &relative.join("custom.pdbqt")).unwrap();
        assert!(explicit.is_absolute());
        assert!(explicit.ends_with(relative.join("custom.pdbqt")));

        fs::remove_dir_all(&relative).unwrap();
    }

    #[test]
    fn test_scratch_dirs_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let a = scratch_dir(dir.path(), "Ligands", Path::new("lig.sdf")).unwrap();
        let b = scratch_dir(dir.path(), "Ligands", Path::new("lig.sdf")).unwrap();
        assert_ne!(a, b);
        assert!(a.is_dir() && b.is_dir());
    }

    #[test]
    fn test_relative_scratch_root_is_made_absolute() {
        let name = format!("prep_scratch_{}", Uuid::new_v4().simple());
        let relative = Path::new("target").join(&name);

        let dir = scratch_dir(&relative, "Ligands", Path::new("lig.sdf")).unwrap();
        assert!(dir.is_absolute());
        assert!(dir.is_dir());

        fs::remove_dir_all(&relative).unwrap();
    }
}
