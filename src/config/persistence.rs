//! Results persistence module
//!
//! Handles saving, loading, and rotation of case reports.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::result::CaseReport;
use crate::{BenchError, Result, APP_NAME, MAX_RESULTS_HISTORY, RESULTS_FILE};

/// Results storage manager
#[derive(Debug)]
pub struct ResultsStorage {
    results_path: PathBuf,
}

/// Results file structure for JSON persistence
#[derive(Debug, Serialize, Deserialize)]
struct ResultsFile {
    version: u32,
    results: Vec<CaseReport>,
}

impl ResultsStorage {
    /// Create a results storage manager at the standard location
    pub fn new() -> Result<Self> {
        Ok(Self::at(Self::results_file_path()?))
    }

    /// Create a results storage manager backed by `path`
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            results_path: path.into(),
        }
    }

    /// Get the standard results file path
    /// Uses $DATA_HOME/bundlebench/results.json
    pub fn results_file_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            BenchError::PersistenceError("Unable to determine data directory".to_string())
        })?;

        Ok(data_dir.join(APP_NAME).join(RESULTS_FILE))
    }

    /// Load all reports from the results file
    pub fn load_results(&self) -> Result<Vec<CaseReport>> {
        if !self.results_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.results_path).map_err(|e| {
            BenchError::PersistenceError(format!(
                "Failed to read results file {}: {}",
                self.results_path.display(),
                e
            ))
        })?;

        let results_file: ResultsFile = serde_json::from_str(&content).map_err(|e| {
            BenchError::PersistenceError(format!(
                "Failed to parse results file {}: {}",
                self.results_path.display(),
                e
            ))
        })?;

        Ok(results_file.results)
    }

    /// Append reports to the results file, keeping the newest
    /// MAX_RESULTS_HISTORY entries
    pub fn append_results(&self, reports: impl IntoIterator<Item = CaseReport>) -> Result<()> {
        let mut results = self.load_results()?;
        results.extend(reports);

        if results.len() > MAX_RESULTS_HISTORY {
            let skip_count = results.len() - MAX_RESULTS_HISTORY;
            results.drain(..skip_count);
        }

        self.save_results(results)
    }

    fn save_results(&self, results: Vec<CaseReport>) -> Result<()> {
        if let Some(parent) = self.results_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BenchError::PersistenceError(format!(
                    "Failed to create results directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let results_file = ResultsFile {
            version: 1,
            results,
        };
        let content = serde_json::to_string_pretty(&results_file)?;

        fs::write(&self.results_path, content).map_err(|e| {
            BenchError::PersistenceError(format!(
                "Failed to write results file {}: {}",
                self.results_path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Get the most recent N reports
    pub fn get_recent_results(&self, count: usize) -> Result<Vec<CaseReport>> {
        let mut results = self.load_results()?;
        let skip_count = results.len().saturating_sub(count);
        results.drain(..skip_count);
        Ok(results)
    }

    /// Clear all stored results
    pub fn clear_results(&self) -> Result<()> {
        if self.results_path.exists() {
            fs::remove_file(&self.results_path)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.results_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BenchmarkConfig;
    use std::time::Duration;
    use tempfile::TempDir;

    fn report(installs: usize) -> CaseReport {
        CaseReport::new(
            "ConcurrentInstall/revised/threads/2",
            BenchmarkConfig::default(),
            2,
            installs,
            vec![Duration::from_millis(10), Duration::from_millis(12)],
        )
    }

    fn storage(dir: &TempDir) -> ResultsStorage {
        ResultsStorage::at(dir.path().join("history").join(RESULTS_FILE))
    }

    #[test]
    fn test_load_empty_results() {
        let temp_dir = TempDir::new().unwrap();
        assert!(storage(&temp_dir).load_results().unwrap().is_empty());
    }

    #[test]
    fn test_append_and_load_results() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);

        storage.append_results(vec![report(10), report(20)]).unwrap();

        let results = storage.load_results().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].installs_per_iteration, 20);
        assert_eq!(results[0].samples.len(), 2);
    }

    #[test]
    fn test_results_rotation() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);

        storage
            .append_results((0..MAX_RESULTS_HISTORY + 10).map(report))
            .unwrap();

        let results = storage.load_results().unwrap();
        assert_eq!(results.len(), MAX_RESULTS_HISTORY);
        assert_eq!(results[0].installs_per_iteration, 10);
        assert_eq!(
            results[results.len() - 1].installs_per_iteration,
            MAX_RESULTS_HISTORY + 9
        );
    }

    #[test]
    fn test_get_recent_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);
        storage.append_results((0..10).map(report)).unwrap();

        let recent = storage.get_recent_results(3).unwrap();
        let installs: Vec<_> = recent.iter().map(|r| r.installs_per_iteration).collect();
        assert_eq!(installs, vec![7, 8, 9]);
        assert_eq!(storage.get_recent_results(50).unwrap().len(), 10);

        storage.clear_results().unwrap();
        assert!(!storage.path().exists());
        assert!(storage.load_results().unwrap().is_empty());
    }

    #[test]
    fn test_results_file_format() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);
        storage.append_results([report(1)]).unwrap();

        let content = fs::read_to_string(storage.path()).unwrap();
        let results_file: ResultsFile = serde_json::from_str(&content).unwrap();
        assert_eq!(results_file.version, 1);
        assert_eq!(results_file.results.len(), 1);
    }

    #[test]
    fn test_corrupt_file_is_a_persistence_error() {
        let temp_dir = TempDir::new().unwrap();
        let storage = storage(&temp_dir);
        fs::create_dir_all(storage.path().parent().unwrap()).unwrap();
        fs::write(storage.path(), "{not json").unwrap();

        assert!(matches!(
            storage.load_results(),
            Err(BenchError::PersistenceError(_))
        ));
    }
}
