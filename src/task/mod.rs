//! Task keys, descriptors and the receptor × center × ligand cross-product

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while building or validating a task set
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    #[error("Invalid center '{0}': expected three comma separated numbers")]
    InvalidCenter(String),

    #[error("Task {0} is listed more than once")]
    DuplicateKey(String),

    #[error("Tasks {first} and {second} map to the same output directory '{dir}'")]
    DirectoryCollision {
        first: String,
        second: String,
        dir: String,
    },
}

/// A search-box center in Angstroms
///
/// Equality and hashing use the bit pattern of each coordinate so centers can be
/// part of a task key. `-0.0` is folded into `0.0`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Center {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Center {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        // adding +0.0 turns -0.0 into +0.0 and leaves everything else alone
        Self {
            x: x + 0.0,
            y: y + 0.0,
            z: z + 0.0,
        }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Two-decimal rendering used in directory names and progress lines
    pub fn label(&self) -> String {
        format!("{:.2}_{:.2}_{:.2}", self.x, self.y, self.z)
    }

    fn bits(&self) -> [u64; 3] {
        [
            (self.x + 0.0).to_bits(),
            (self.y + 0.0).to_bits(),
            (self.z + 0.0).to_bits(),
        ]
    }
}

impl PartialEq for Center {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Center {}

impl Hash for Center {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

impl From<(f64, f64, f64)> for Center {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self::new(x, y, z)
    }
}

impl fmt::Display for Center {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl FromStr for Center {
    type Err = TaskError;

    /// Parse `x,y,z`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values: Vec<f64> = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| TaskError::InvalidCenter(s.to_string()))?;

        match values.as_slice() {
            [x, y, z] if values.iter().all(|v| v.is_finite()) => Ok(Center::new(*x, *y, *z)),
            _ => Err(TaskError::InvalidCenter(s.to_string())),
        }
    }
}

/// Identity of one docking task within a batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    /// Receptor file name
    pub receptor: String,

    /// Ligand file name
    pub ligand: String,

    /// Search-box center
    pub center: Center,
}

impl TaskKey {
    pub fn new(receptor: impl Into<String>, ligand: impl Into<String>, center: Center) -> Self {
        Self {
            receptor: receptor.into(),
            ligand: ligand.into(),
            center,
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} + {} @ center {}",
            self.receptor,
            self.ligand,
            self.center.label()
        )
    }
}

/// Key of a per-file task (preparation, pocket finding): the input path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputKey(pub PathBuf);

impl InputKey {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl From<PathBuf> for InputKey {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl fmt::Display for InputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// One unit of work: a key, the bound arguments of the external call, and the
/// number of threads that call may use
#[derive(Debug, Clone)]
pub struct TaskDescriptor<K, A> {
    pub key: K,
    pub args: A,
    pub cpu_share: usize,
}

impl<K, A> TaskDescriptor<K, A> {
    pub fn new(key: K, args: A) -> Self {
        Self {
            key,
            args,
            cpu_share: 1,
        }
    }

    pub fn with_cpu_share(mut self, cpu_share: usize) -> Self {
        self.cpu_share = cpu_share.max(1);
        self
    }
}

/// Arguments of a single docking call
#[derive(Debug, Clone, PartialEq)]
pub struct DockingArgs {
    pub receptor: PathBuf,
    pub ligand: PathBuf,
    pub center: Center,
}

/// Receptors in input order, each with the pocket centers to dock against
pub type ReceptorCenters = Vec<(PathBuf, Vec<Center>)>;

/// Expand receptors × centers × ligands into docking descriptors.
///
/// Emission order is receptor, then center, then ligand. Any empty input yields
/// an empty list.
pub fn build_docking_tasks(
    receptors: &ReceptorCenters,
    ligands: &[PathBuf],
) -> Vec<TaskDescriptor<TaskKey, DockingArgs>> {
    let mut tasks = Vec::new();

    for (receptor, centers) in receptors {
        for center in centers {
            for ligand in ligands {
                let key = TaskKey::new(file_name(receptor), file_name(ligand), *center);
                let args = DockingArgs {
                    receptor: receptor.clone(),
                    ligand: ligand.clone(),
                    center: *center,
                };
                tasks.push(TaskDescriptor::new(key, args));
            }
        }
    }

    tasks
}

/// Output directory name of a docking task
pub fn task_dir_name(args: &DockingArgs) -> String {
    format!(
        "{}_{}_center_{}",
        file_stem(&args.receptor),
        file_stem(&args.ligand),
        args.center.label()
    )
}

/// Reject duplicate keys and tasks that would share an output directory
pub fn validate_docking_tasks(
    tasks: &[TaskDescriptor<TaskKey, DockingArgs>],
) -> Result<(), TaskError> {
    let mut keys: HashSet<&TaskKey> = HashSet::with_capacity(tasks.len());
    let mut dirs: HashMap<String, &TaskKey> = HashMap::with_capacity(tasks.len());

    for task in tasks {
        if !keys.insert(&task.key) {
            return Err(TaskError::DuplicateKey(task.key.to_string()));
        }

        let dir = task_dir_name(&task.args);
        if let Some(first) = dirs.get(&dir) {
            return Err(TaskError::DirectoryCollision {
                first: first.to_string(),
                second: task.key.to_string(),
                dir,
            });
        }
        dirs.insert(dir, &task.key);
    }

    Ok(())
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}
