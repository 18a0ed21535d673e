//! Protein preparation: optional Open Babel conversion, PDBFixer, then
//! `prepare_receptor4.py`

use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ToolConfig;
use crate::prep::{check_input, resolve_output, scratch_dir, PrepError, PrepOptions, Preparer};
use crate::process::{Deadline, ToolInvocation};
use crate::task::file_stem;

/// Protein formats accepted here; everything but PDB goes through Open Babel
pub const PROTEIN_EXTENSIONS: &[&str] = &["pdb", "mol2", "sdf", "pdbqt", "cif", "ent", "xyz"];

/// Prepares receptors with `obabel`, `pdbfixer` and the MGLTools receptor script
#[derive(Debug, Clone)]
pub struct ProteinPreparer {
    obabel: PathBuf,
    pdbfixer: PathBuf,
    mgl_python: PathBuf,
    script: PathBuf,
    scratch_root: PathBuf,
    timeout: Option<Duration>,
}

impl ProteinPreparer {
    pub fn new(config: &ToolConfig) -> Self {
        Self {
            obabel: config.obabel.clone(),
            pdbfixer: config.pdbfixer.clone(),
            mgl_python: config.mgl_python.clone(),
            script: config.prepare_receptor_script.clone(),
            scratch_root: config.scratch_dir.clone(),
            timeout: config.task_timeout(),
        }
    }

    pub fn conversion_command(&self, input: &Path, pdb: &Path) -> ToolInvocation {
        ToolInvocation::new(&self.obabel)
            .arg(input)
            .arg("-O")
            .arg(pdb)
            .arg("--gen3d")
            .timeout(self.timeout)
    }

    /// PDBFixer call, or `None` when neither fixing nor heterogen removal is requested
    pub fn fixer_command(&self, pdb: &Path, fixed: &Path, options: &PrepOptions) -> Option<ToolInvocation> {
        if !options.fix_pdb && !options.remove_heterogens {
            return None;
        }

        let mut output = std::ffi::OsString::from("--output=");
        output.push(fixed.as_os_str());

        let mut invocation = ToolInvocation::new(&self.pdbfixer)
            .arg(pdb)
            .arg(output)
            .timeout(self.timeout);

        invocation = if options.fix_pdb {
            invocation.args(["--add-residues", "--replace-nonstandard", "--add-atoms=heavy"])
        } else {
            invocation.arg("--add-atoms=none")
        };

        let keep = if options.remove_heterogens { "water" } else { "all" };
        Some(invocation.arg(format!("--keep-heterogens={}", keep)))
    }

    pub fn pdbqt_command(&self, pdb: &Path, output: &Path, options: &PrepOptions) -> ToolInvocation {
        let cleanup = if options.remove_water {
            "nphs_lps_waters"
        } else {
            "nphs_lps"
        };

        let mut invocation = ToolInvocation::new(&self.mgl_python)
            .arg(&self.script)
            .arg("-r")
            .arg(pdb)
            .arg("-o")
            .arg(output)
            .args(["-U", cleanup])
            .timeout(self.timeout);

        if options.add_hydrogens {
            invocation = invocation.args(["-A", "hydrogens"]);
        }
        invocation.args(options.charge_args())
    }
}

impl Preparer for ProteinPreparer {
    fn name(&self) -> &'static str {
        "protein"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        PROTEIN_EXTENSIONS
    }

    fn prepare(&self, input: &Path, options: &PrepOptions, save_to: &Path) -> Result<PathBuf, PrepError> {
        let deadline = Deadline::after(self.timeout);
        let extension = check_input(input, PROTEIN_EXTENSIONS)?;
        let scratch = scratch_dir(&self.scratch_root, "Proteins", input)?;
        let stem = file_stem(input);

        let pdb = if extension == "pdb" {
            input.to_path_buf()
        } else {
            let converted = scratch.join(format!("{}.pdb", stem));
            debug!("Converting {} to PDB", input.display());
            self.conversion_command(input, &converted).within(deadline).run()?;
            converted
        };

        let fixed = scratch.join(format!("{}_fixed.pdb", stem));
        match self.fixer_command(&pdb, &fixed, options) {
            Some(fixer) => {
                fixer.within(deadline).run()?;
                if !fixed.exists() {
                    return Err(PrepError::MissingOutput(fixed));
                }
            }
            None => {
                fs::copy(&pdb, &fixed)?;
            }
        }

        let output = resolve_output(input, save_to)?;
        self.pdbqt_command(&fixed, &output, options)
            .within(deadline)
            .run()?;

        if !output.exists() {
            return Err(PrepError::MissingOutput(output));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(invocation: &ToolInvocation) -> Vec<String> {
        invocation
            .arguments()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_fixer_command() {
        let preparer = ProteinPreparer::new(&ToolConfig::default());
        let fixer = preparer
            .fixer_command(Path::new("rec.pdb"), Path::new("tmp/rec_fixed.pdb"), &PrepOptions::default())
            .unwrap();

        assert_eq!(
            strings(&fixer),
            vec![
                "rec.pdb",
                "--output=tmp/rec_fixed.pdb",
                "--add-residues",
                "--replace-nonstandard",
                "--add-atoms=heavy",
                "--keep-heterogens=water"
            ]
        );
    }

    #[test]
    fn test_fixer_skipped() {
        let preparer = ProteinPreparer::new(&ToolConfig::default());
        let options = PrepOptions {
            fix_pdb: false,
            remove_heterogens: false,
            ..PrepOptions::default()
        };
        assert!(preparer
            .fixer_command(Path::new("a.pdb"), Path::new("b.pdb"), &options)
            .is_none());
    }

    #[test]
    fn test_pdbqt_command() {
        let preparer = ProteinPreparer::new(&ToolConfig::default());
        let options = PrepOptions {
            remove_water: false,
            preserve_charge_types: Some(vec!["Zn".to_string()]),
            ..PrepOptions::default()
        };
        let args = strings(&preparer.pdbqt_command(Path::new("fixed.pdb"), Path::new("rec.pdbqt"), &options));

        assert_eq!(
            args,
            vec![
                "prepare_receptor4.py", "-r", "fixed.pdb", "-o", "rec.pdbqt", "-U", "nphs_lps", "-A",
                "hydrogens", "-p", "Zn"
            ]
        );
    }

    #[test]
    fn test_water_cleanup_flag() {
        let preparer = ProteinPreparer::new(&ToolConfig::default());
        let args = strings(&preparer.pdbqt_command(
            Path::new("fixed.pdb"),
            Path::new("rec.pdbqt"),
            &PrepOptions::default(),
        ));
        assert!(args.contains(&"nphs_lps_waters".to_string()));
    }

    #[test]
    fn test_missing_protein() {
        let dir = tempfile::tempdir().unwrap();
        let preparer = ProteinPreparer::new(&ToolConfig::default());
        let err = preparer
            .prepare(&dir.path().join("gone.pdb"), &PrepOptions::default(), dir.path())
            .unwrap_err();
        assert!(matches!(err, PrepError::MissingInput(_)));
    }
}
