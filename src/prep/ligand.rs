//! Ligand preparation: Open Babel 3D conversion, then `prepare_ligand4.py`

use log::debug;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ToolConfig;
use crate::prep::{check_input, resolve_output, scratch_dir, PrepError, PrepOptions, Preparer};
use crate::process::{Deadline, ToolInvocation};
use crate::task::file_stem;

/// Ligand formats accepted by Open Babel here
pub const LIGAND_EXTENSIONS: &[&str] = &["mol2", "sdf", "pdb", "mol", "smi"];

/// Prepares ligands with `obabel` and the MGLTools ligand script
#[derive(Debug, Clone)]
pub struct LigandPreparer {
    obabel: PathBuf,
    mgl_python: PathBuf,
    script: PathBuf,
    scratch_root: PathBuf,
    timeout: Option<Duration>,
}

impl LigandPreparer {
    pub fn new(config: &ToolConfig) -> Self {
        Self {
            obabel: config.obabel.clone(),
            mgl_python: config.mgl_python.clone(),
            script: config.prepare_ligand_script.clone(),
            scratch_root: config.scratch_dir.clone(),
            timeout: config.task_timeout(),
        }
    }

    /// Conversion of `input` to a 3D MOL2 file
    pub fn conversion_command(
        &self,
        input: &Path,
        format: &str,
        mol2: &Path,
        options: &PrepOptions,
    ) -> ToolInvocation {
        let mut invocation = ToolInvocation::new(&self.obabel)
            .args(["-i", format])
            .arg(input)
            .args(["-o", "mol2", "-O"])
            .arg(mol2)
            .arg("--gen3d")
            .timeout(self.timeout);

        if options.remove_water {
            invocation = invocation.args(["--delete", "HOH", "--delete", "[#8H2]"]);
        }
        if let Some(ff) = options.minimize.forcefield() {
            invocation = invocation.args(["--minimize", "--ff", ff]);
        }
        invocation
    }

    /// `prepare_ligand4.py` call turning the MOL2 file into PDBQT
    pub fn pdbqt_command(&self, mol2: &Path, output: &Path, options: &PrepOptions) -> ToolInvocation {
        let hydrogens = if options.add_hydrogens { "hydrogens" } else { "None" };

        ToolInvocation::new(&self.mgl_python)
            .arg(&self.script)
            .arg("-l")
            .arg(mol2)
            .arg("-o")
            .arg(output)
            .args(["-U", "nphs_lps", "-A", hydrogens])
            .args(options.charge_args())
            .timeout(self.timeout)
    }
}

impl Preparer for LigandPreparer {
    fn name(&self) -> &'static str {
        "ligand"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        LIGAND_EXTENSIONS
    }

    fn prepare(&self, input: &Path, options: &PrepOptions, save_to: &Path) -> Result<PathBuf, PrepError> {
        let deadline = Deadline::after(self.timeout);
        let format = check_input(input, LIGAND_EXTENSIONS)?;
        let scratch = scratch_dir(&self.scratch_root, "Ligands", input)?;
        let mol2 = scratch.join(format!("{}.mol2", file_stem(input)));

        debug!("Converting {} to {}", input.display(), mol2.display());
        self.conversion_command(input, &format, &mol2, options)
            .within(deadline)
            .run()?;

        let output = resolve_output(input, save_to)?;
        self.pdbqt_command(&mol2, &output, options)
            .current_dir(&scratch)
            .within(deadline)
            .run()?;

        if !output.exists() {
            return Err(PrepError::MissingOutput(output));
        }
        Ok(output)
    }
}
