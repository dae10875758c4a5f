//! Evidence ledger scanning.
//!
//! Confidence-check records are written by an external finalization step.
//! The scanner re-enumerates the whole source on every call and excludes,
//! rather than reports, anything it cannot read or validate.

use crate::pattern::{CommandPattern, DEFAULT_MAX_PATTERN_LEN};
use crate::types::{Evidence, EvidenceKind};
use serde::Deserialize;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// One finalized record as delivered by an evidence source, not yet parsed.
#[derive(Debug)]
pub struct RawRecord {
    pub source_id: String,
    pub contents: io::Result<Vec<u8>>,
}

impl RawRecord {
    pub fn new(source_id: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            source_id: source_id.into(),
            contents: Ok(contents.into()),
        }
    }
}

/// A collection of individually addressable confidence-check records.
///
/// Each call to [`EvidenceSource::records`] starts a fresh, finite pass.
pub trait EvidenceSource: Send + Sync {
    fn records(&self) -> Box<dyn Iterator<Item = RawRecord> + '_>;
}

/// Evidence source backed by a directory of `*.json` files.
///
/// Only files with a `.json` extension count as finalized; writers are
/// expected to land records via rename. A missing directory is an empty
/// source.
#[derive(Debug, Clone)]
pub struct DirectoryEvidenceSource {
    dir: PathBuf,
}

impl DirectoryEvidenceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn finalized_paths(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.dir.display(), error = %e, "evidence directory not readable");
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        paths
    }
}

impl EvidenceSource for DirectoryEvidenceSource {
    fn records(&self) -> Box<dyn Iterator<Item = RawRecord> + '_> {
        Box::new(self.finalized_paths().into_iter().map(|path| {
            let source_id = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            RawRecord {
                source_id,
                contents: std::fs::read(&path),
            }
        }))
    }
}

/// In-memory evidence source for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryEvidenceSource {
    records: RwLock<Vec<(String, Vec<u8>)>>,
}

impl InMemoryEvidenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_json(&self, source_id: impl Into<String>, record: &Value) {
        self.push_raw(source_id, record.to_string().into_bytes());
    }

    pub fn push_raw(&self, source_id: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut guard) = self.records.write() {
            guard.push((source_id.into(), bytes.into()));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.records.write() {
            guard.clear();
        }
    }
}

impl EvidenceSource for InMemoryEvidenceSource {
    fn records(&self) -> Box<dyn Iterator<Item = RawRecord> + '_> {
        let snapshot = match self.records.read() {
            Ok(guard) => guard.clone(),
            Err(_) => Vec::new(),
        };
        Box::new(
            snapshot
                .into_iter()
                .map(|(source_id, bytes)| RawRecord::new(source_id, bytes)),
        )
    }
}

#[derive(Deserialize)]
struct RegressionFlags {
    regressed: bool,
    acknowledged: bool,
}

/// A validated confidence-check record.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceCheckRecord {
    pub source_id: String,
    /// `command`, or `baseline.command` for comparison checks.
    pub command: Option<String>,
    pub regressed: bool,
    pub acknowledged: bool,
    /// The whole `regression` object, diagnostics included.
    pub regression: Value,
}

impl ConfidenceCheckRecord {
    /// Validate a raw record. Returns `None` for anything that is not a JSON
    /// object with a `regression` object carrying boolean `regressed` and
    /// `acknowledged` flags.
    pub fn parse(source_id: &str, bytes: &[u8]) -> Option<Self> {
        let value: Value = serde_json::from_slice(bytes).ok()?;
        let object = value.as_object()?;
        let regression = object.get("regression")?;
        if !regression.is_object() {
            return None;
        }
        let flags = RegressionFlags::deserialize(regression).ok()?;

        let command = non_empty_str(object.get("command")).or_else(|| {
            object
                .get("baseline")
                .and_then(Value::as_object)
                .and_then(|baseline| non_empty_str(baseline.get("command")))
        });

        Some(Self {
            source_id: source_id.to_string(),
            command,
            regressed: flags.regressed,
            acknowledged: flags.acknowledged,
            regression: regression.clone(),
        })
    }

    /// Regressed and not yet acknowledged.
    pub fn is_evidence(&self) -> bool {
        self.regressed && !self.acknowledged
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Finds unacknowledged regression evidence for a delegation pattern.
#[derive(Clone)]
pub struct EvidenceScanner {
    source: Arc<dyn EvidenceSource>,
    max_pattern_len: usize,
}

impl EvidenceScanner {
    pub fn new(source: Arc<dyn EvidenceSource>) -> Self {
        Self {
            source,
            max_pattern_len: DEFAULT_MAX_PATTERN_LEN,
        }
    }

    pub fn with_max_pattern_len(mut self, limit: usize) -> Self {
        self.max_pattern_len = limit;
        self
    }

    /// Return the first qualifying record whose command matches `pattern`.
    pub fn find_regression_evidence(&self, pattern: &str) -> Option<Evidence> {
        let pattern = match CommandPattern::parse_with_limit(pattern, self.max_pattern_len) {
            Ok(p) => p,
            Err(e) => {
                debug!(pattern, error = %e, "malformed pattern, no evidence can match");
                return None;
            }
        };

        self.source.records().find_map(|raw| {
            let bytes = match raw.contents {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(source_id = %raw.source_id, error = %e, "skipping unreadable evidence record");
                    return None;
                }
            };
            let Some(record) = ConfidenceCheckRecord::parse(&raw.source_id, &bytes) else {
                debug!(source_id = %raw.source_id, "skipping malformed evidence record");
                return None;
            };
            if !record.is_evidence() {
                return None;
            }
            let command = record.command?;
            if !pattern.matches(&command) {
                return None;
            }
            Some(Evidence {
                kind: EvidenceKind::ConfidenceRegression,
                source_id: record.source_id,
                command,
                regression: record.regression,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scanner_with(records: &[(&str, Value)]) -> (Arc<InMemoryEvidenceSource>, EvidenceScanner) {
        let source = Arc::new(InMemoryEvidenceSource::new());
        for (id, record) in records {
            source.push_json(*id, record);
        }
        let scanner = EvidenceScanner::new(source.clone());
        (source, scanner)
    }

    fn regression(regressed: bool, acknowledged: bool) -> Value {
        json!({"regressed": regressed, "acknowledged": acknowledged, "score_delta": -0.2})
    }

    #[test]
    fn qualifying_record_is_returned_with_payload() {
        let (_, scanner) = scanner_with(&[(
            "r1",
            json!({"command": "deploy prod", "regression": regression(true, false)}),
        )]);
        let evidence = scanner.find_regression_evidence("deploy *").unwrap();
        assert_eq!(evidence.kind, EvidenceKind::ConfidenceRegression);
        assert_eq!(evidence.source_id, "r1");
        assert_eq!(evidence.command, "deploy prod");
        assert_eq!(evidence.regression["score_delta"], json!(-0.2));
    }

    #[test]
    fn acknowledged_or_clean_records_are_inert() {
        let (_, scanner) = scanner_with(&[
            ("ack", json!({"command": "deploy prod", "regression": regression(true, true)})),
            ("clean", json!({"command": "deploy prod", "regression": regression(false, false)})),
            ("both", json!({"command": "deploy prod", "regression": regression(false, true)})),
        ]);
        assert!(scanner.find_regression_evidence("deploy *").is_none());
    }

    #[test]
    fn baseline_command_is_the_fallback() {
        let (_, scanner) = scanner_with(&[(
            "cmp",
            json!({"baseline": {"command": "deploy prod", "score": 0.9}, "regression": regression(true, false)}),
        )]);
        let evidence = scanner.find_regression_evidence("deploy *").unwrap();
        assert_eq!(evidence.command, "deploy prod");
    }

    #[test]
    fn records_without_command_are_skipped() {
        let (_, scanner) = scanner_with(&[
            ("none", json!({"regression": regression(true, false)})),
            ("blank", json!({"command": "  ", "regression": regression(true, false)})),
        ]);
        assert!(scanner.find_regression_evidence("**").is_none());
    }

    #[test]
    fn corrupt_records_do_not_abort_the_scan() {
        let source = Arc::new(InMemoryEvidenceSource::new());
        source.push_raw("truncated", b"{\"command\": \"deploy pr".to_vec());
        source.push_json("array", &json!([1, 2, 3]));
        source.push_json("flags-missing", &json!({"command": "deploy prod", "regression": {"regressed": true}}));
        source.push_json("flags-wrong-type", &json!({"command": "deploy prod", "regression": {"regressed": "yes", "acknowledged": false}}));
        source.push_json("good", &json!({"command": "deploy prod", "regression": regression(true, false)}));
        let scanner = EvidenceScanner::new(source);
        assert_eq!(scanner.find_regression_evidence("deploy *").unwrap().source_id, "good");
    }

    #[test]
    fn first_qualifying_match_wins() {
        let (_, scanner) = scanner_with(&[
            ("other", json!({"command": "rollback prod", "regression": regression(true, false)})),
            ("first", json!({"command": "deploy prod", "regression": regression(true, false)})),
            ("second", json!({"command": "deploy staging", "regression": regression(true, false)})),
        ]);
        assert_eq!(scanner.find_regression_evidence("deploy *").unwrap().source_id, "first");
    }

    #[test]
    fn malformed_pattern_finds_nothing() {
        let (_, scanner) = scanner_with(&[(
            "r1",
            json!({"command": "deploy prod", "regression": regression(true, false)}),
        )]);
        assert!(scanner.find_regression_evidence("").is_none());
        assert!(scanner.find_regression_evidence("deploy {prod").is_none());
    }

    #[test]
    fn each_call_sees_current_contents() {
        let (source, scanner) = scanner_with(&[]);
        assert!(scanner.find_regression_evidence("deploy *").is_none());
        source.push_json("late", &json!({"command": "deploy prod", "regression": regression(true, false)}));
        assert!(scanner.find_regression_evidence("deploy *").is_some());
        source.clear();
        assert!(scanner.find_regression_evidence("deploy *").is_none());
    }

    #[test]
    fn directory_source_reads_only_finalized_json() {
        let dir = tempfile::tempdir().unwrap();
        let record = json!({"command": "deploy prod", "regression": regression(true, false)});
        std::fs::write(dir.path().join("b.json"), record.to_string()).unwrap();
        std::fs::write(dir.path().join("a.json.tmp"), record.to_string()).unwrap();
        std::fs::write(dir.path().join("a.json"), b"not json").unwrap();
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        let source = DirectoryEvidenceSource::new(dir.path());
        let ids: Vec<String> = source.records().map(|r| r.source_id).collect();
        assert_eq!(ids, vec!["a.json".to_string(), "b.json".to_string()]);

        let scanner = EvidenceScanner::new(Arc::new(source));
        assert_eq!(scanner.find_regression_evidence("deploy *").unwrap().source_id, "b.json");
    }

    #[test]
    fn missing_directory_is_empty_source() {
        let source = DirectoryEvidenceSource::new("/nonexistent/sintra/confidence");
        assert_eq!(source.records().count(), 0);
    }
}
