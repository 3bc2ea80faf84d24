use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use walkdir::WalkDir;

/// File-name convention of the reporter plugin's per-test artifacts.
pub const RESULT_FILE_PATTERN: &str = "*-result.json";

/// One decoded result artifact. The schema belongs to the reporter plugin.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TestResult(Map<String, Value>);

impl TestResult {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn name(&self) -> Option<&str> {
        self.get("name").and_then(Value::as_str)
    }

    pub fn status(&self) -> Option<&str> {
        self.get("status").and_then(Value::as_str)
    }

    /// Value of the first `labels` entry with the given name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.get("labels")
            .and_then(Value::as_array)?
            .iter()
            .find(|label| label.get("name").and_then(Value::as_str) == Some(name))
            .and_then(|label| label.get("value"))
            .and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

#[derive(Debug)]
pub enum ArtifactError {
    Pattern(globset::Error),
    Scan(walkdir::Error),
    Read(std::io::Error),
    Decode(serde_json::Error),
    NotAnObject,
}

impl std::fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactError::Pattern(error) => {
                write!(f, "invalid result file pattern `{RESULT_FILE_PATTERN}`: {error}")
            }
            ArtifactError::Scan(error) => write!(f, "directory scan failed: {error}"),
            ArtifactError::Read(error) => write!(f, "read failed: {error}"),
            ArtifactError::Decode(error) => write!(f, "invalid JSON: {error}"),
            ArtifactError::NotAnObject => write!(f, "top-level JSON value is not an object"),
        }
    }
}

impl std::error::Error for ArtifactError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArtifactError::Pattern(error) => Some(error),
            ArtifactError::Scan(error) => Some(error),
            ArtifactError::Read(error) => Some(error),
            ArtifactError::Decode(error) => Some(error),
            ArtifactError::NotAnObject => None,
        }
    }
}

/// An artifact that was found but could not be turned into a [`TestResult`].
#[derive(Debug)]
pub struct ArtifactFailure {
    pub path: PathBuf,
    pub error: ArtifactError,
}

impl std::fmt::Display for ArtifactFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

#[derive(Debug, Default)]
pub struct AllureReport {
    pub test_results: Vec<TestResult>,
    pub failures: Vec<ArtifactFailure>,
}

impl AllureReport {
    pub fn is_empty(&self) -> bool {
        self.test_results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.test_results.len()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&TestResult> {
        self.test_results
            .iter()
            .find(|result| result.name() == Some(name))
    }

    /// Counts per `status`, in first-seen order. Results without one count as `unknown`.
    pub fn status_counts(&self) -> IndexMap<String, usize> {
        let mut counts = IndexMap::<String, usize>::new();
        for result in &self.test_results {
            let status = result.status().unwrap_or("unknown");
            *counts.entry(status.to_owned()).or_insert(0) += 1;
        }
        counts
    }
}

/// Reads every `*-result.json` directly under `dir`.
///
/// A missing directory gives an empty report. Unreadable or malformed files
/// land in `failures`; the remaining files are still collected. Results are
/// ordered by file name.
pub fn collect_results(dir: &Path) -> AllureReport {
    let mut report = AllureReport::default();
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "results directory missing; nothing to collect");
        return report;
    }

    let matcher = match result_file_matcher() {
        Ok(matcher) => matcher,
        Err(error) => {
            record_failure(&mut report, dir.to_path_buf(), error);
            return report;
        }
    };
    let mut files = Vec::<PathBuf>::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                let path = error.path().unwrap_or(dir).to_path_buf();
                record_failure(&mut report, path, ArtifactError::Scan(error));
                continue;
            }
        };
        if !entry.file_type().is_file() || !matcher.is_match(entry.file_name()) {
            continue;
        }
        files.push(entry.into_path());
    }
    files.sort();

    for path in files {
        match read_result(&path) {
            Ok(result) => report.test_results.push(result),
            Err(error) => record_failure(&mut report, path, error),
        }
    }

    tracing::debug!(
        dir = %dir.display(),
        collected = report.test_results.len(),
        failed = report.failures.len(),
        "collected result artifacts"
    );
    report
}

fn result_file_matcher() -> Result<GlobMatcher, ArtifactError> {
    Glob::new(RESULT_FILE_PATTERN)
        .map(|glob| glob.compile_matcher())
        .map_err(ArtifactError::Pattern)
}

fn read_result(path: &Path) -> Result<TestResult, ArtifactError> {
    let raw = std::fs::read(path).map_err(ArtifactError::Read)?;
    match serde_json::from_slice::<Value>(&raw).map_err(ArtifactError::Decode)? {
        Value::Object(map) => Ok(TestResult(map)),
        _ => Err(ArtifactError::NotAnObject),
    }
}

fn record_failure(report: &mut AllureReport, path: PathBuf, error: ArtifactError) {
    tracing::warn!(path = %path.display(), %error, "skipping result artifact");
    report.failures.push(ArtifactFailure { path, error });
}

#[cfg(test)]
#[path = "tests/report_tests.rs"]
mod tests;
