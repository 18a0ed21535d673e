//! Completion-ordered collection of per-task outcomes

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::hash::Hash;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Success artifact or human-readable failure message
pub type Outcome<T> = Result<T, String>;

/// Errors raised by the outcome map
#[derive(Error, Debug)]
pub enum OutcomeError {
    #[error("An outcome for task {0} was already recorded")]
    DuplicateOutcome(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Totals reported at the end of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tasks, {} succeeded, {} failed",
            self.total, self.succeeded, self.failed
        )
    }
}

/// Mapping from task key to outcome, iterated in the order outcomes arrived
#[derive(Debug, Clone)]
pub struct OutcomeMap<K, T> {
    entries: Vec<(K, Outcome<T>)>,
    index: HashMap<K, usize>,
}

impl<K, T> Default for OutcomeMap<K, T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone + fmt::Display, T> OutcomeMap<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Record the outcome of a task. A key may only be recorded once.
    pub fn insert(&mut self, key: K, outcome: Outcome<T>) -> Result<(), OutcomeError> {
        if self.index.contains_key(&key) {
            return Err(OutcomeError::DuplicateOutcome(key.to_string()));
        }

        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, outcome));
        Ok(())
    }

    pub fn get(&self, key: &K) -> Option<&Outcome<T>> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in completion order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &Outcome<T>)> {
        self.entries.iter().map(|(k, o)| (k, o))
    }

    pub fn successes(&self) -> impl Iterator<Item = (&K, &T)> {
        self.entries
            .iter()
            .filter_map(|(k, o)| o.as_ref().ok().map(|v| (k, v)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&K, &str)> {
        self.entries
            .iter()
            .filter_map(|(k, o)| o.as_ref().err().map(|e| (k, e.as_str())))
    }

    pub fn summary(&self) -> BatchSummary {
        let succeeded = self.entries.iter().filter(|(_, o)| o.is_ok()).count();
        BatchSummary {
            total: self.entries.len(),
            succeeded,
            failed: self.entries.len() - succeeded,
        }
    }

    pub fn into_entries(self) -> Vec<(K, Outcome<T>)> {
        self.entries
    }
}

#[derive(Serialize)]
struct ExportEntry<'a, K, T> {
    key: &'a K,
    #[serde(flatten)]
    outcome: ExportOutcome<'a, T>,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum ExportOutcome<'a, T> {
    Ok(&'a T),
    Err(&'a str),
}

impl<K, T> OutcomeMap<K, T>
where
    K: Eq + Hash + Clone + fmt::Display + Serialize,
    T: Serialize,
{
    /// Write every entry as a JSON array, in completion order
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), OutcomeError> {
        let entries: Vec<_> = self
            .entries
            .iter()
            .map(|(key, outcome)| ExportEntry {
                key,
                outcome: match outcome {
                    Ok(value) => ExportOutcome::Ok(value),
                    Err(message) => ExportOutcome::Err(message.as_str()),
                },
            })
            .collect();

        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &entries)?;
        writeln!(writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_completion_order_is_kept() {
        let mut map: OutcomeMap<String, u32> = OutcomeMap::new();
        map.insert("c".into(), Ok(3)).unwrap();
        map.insert("a".into(), Err("boom".into())).unwrap();
        map.insert("b".into(), Ok(2)).unwrap();

        let keys: Vec<&String> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
        assert_eq!(map.get(&"a".to_string()), Some(&Err("boom".to_string())));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut map: OutcomeMap<String, u32> = OutcomeMap::new();
        map.insert("a".into(), Ok(1)).unwrap();
        assert!(matches!(
            map.insert("a".into(), Ok(2)),
            Err(OutcomeError::DuplicateOutcome(_))
        ));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&"a".to_string()), Some(&Ok(1)));
    }

    #[test]
    fn test_summary_counts() {
        let mut map: OutcomeMap<String, u32> = OutcomeMap::with_capacity(4);
        map.insert("a".into(), Ok(1)).unwrap();
        map.insert("b".into(), Err("x".into())).unwrap();
        map.insert("c".into(), Ok(3)).unwrap();
        map.insert("d".into(), Err("y".into())).unwrap();

        assert_eq!(
            map.summary(),
            BatchSummary {
                total: 4,
                succeeded: 2,
                failed: 2
            }
        );
        assert_eq!(map.successes().count(), 2);
        let failed: Vec<_> = map.failures().map(|(k, e)| (k.as_str(), e)).collect();
        assert_eq!(failed, vec![("b", "x"), ("d", "y")]);
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("outcomes.json");

        let mut map: OutcomeMap<String, PathBuf> = OutcomeMap::new();
        map.insert("ok".into(), Ok(PathBuf::from("/tmp/a"))).unwrap();
        map.insert("bad".into(), Err("exit code 1".into())).unwrap();
        map.write_json(&out).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        let entries = value.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["key"], "ok");
        assert_eq!(entries[0]["ok"], "/tmp/a");
        assert_eq!(entries[1]["err"], "exit code 1");
    }
}
