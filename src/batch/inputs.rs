//! Turning command line paths into the list of files a batch works on

use std::fs;
use std::path::{Path, PathBuf};

use crate::batch::BatchError;

/// Expand `paths` into input files.
///
/// A single directory yields its files with a supported extension, sorted by
/// name. A single file must have a supported extension. Several paths are an
/// explicit list: each must exist, and a file of the wrong kind is left for
/// its own task to fail on.
pub fn collect_inputs(paths: &[PathBuf], extensions: &[&str]) -> Result<Vec<PathBuf>, BatchError> {
    let files = match paths {
        [] => Vec::new(),
        [single] if single.is_dir() => scan_directory(single, extensions)?,
        [single] if single.is_file() => {
            if !has_extension(single, extensions) {
                return Err(BatchError::UnsupportedExtension {
                    path: single.clone(),
                    supported: extensions.join(", "),
                });
            }
            vec![single.clone()]
        }
        [single] => return Err(BatchError::MissingInput(single.clone())),
        many => {
            if let Some(missing) = many.iter().find(|p| !p.exists()) {
                return Err(BatchError::MissingInput(missing.clone()));
            }
            many.to_vec()
        }
    };

    if files.is_empty() {
        return Err(BatchError::EmptyInput(format!(
            "no input files with extension {}",
            extensions.join(", ")
        )));
    }
    Ok(files)
}

fn scan_directory(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, BatchError> {
    let entries = fs::read_dir(dir).map_err(|_| BatchError::MissingInput(dir.to_path_buf()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_extension(path, extensions))
        .collect();
    files.sort();
    Ok(files)
}

pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .map(|ext| extensions.contains(&ext.as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "").unwrap();
        path
    }

    #[test]
    fn test_directory_is_filtered_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.pdbqt");
        touch(dir.path(), "a.PDBQT");
        touch(dir.path(), "notes.txt");
        fs::create_dir(dir.path().join("sub.pdbqt")).unwrap();

        let files = collect_inputs(&[dir.path().to_path_buf()], &["pdbqt"]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PDBQT", "b.pdbqt"]);
    }

    #[test]
    fn test_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let lig = touch(dir.path(), "lig.sdf");
        assert_eq!(collect_inputs(&[lig.clone()], &["sdf"]).unwrap(), vec![lig.clone()]);
        assert!(matches!(
            collect_inputs(&[lig], &["pdbqt"]),
            Err(BatchError::UnsupportedExtension { .. })
        ));
    }

    #[test]
    fn test_explicit_list_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let b = touch(dir.path(), "b.pdbqt");
        let a = touch(dir.path(), "a.pdbqt");
        assert_eq!(
            collect_inputs(&[b.clone(), a.clone()], &["pdbqt"]).unwrap(),
            vec![b, a]
        );
    }

    #[test]
    fn test_missing_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            collect_inputs(&[dir.path().join("nope")], &["pdbqt"]),
            Err(BatchError::MissingInput(_))
        ));
        assert!(matches!(
            collect_inputs(&[dir.path().to_path_buf()], &["pdbqt"]),
            Err(BatchError::EmptyInput(_))
        ));
        assert!(matches!(collect_inputs(&[], &["pdbqt"]), Err(BatchError::EmptyInput(_))));
    }
}
