//! Operator journal: an append-only, hash-chained JSONL log of suspensions.
//!
//! The approval store remains the source of truth. The journal exists for
//! operators and auditors, and failures to write it never change a decision.

use crate::error::{GovernanceError, GovernanceResult};
use crate::types::{SuspensionReason, SuspensionRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One journal line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub entry_id: String,
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    pub class_id: String,
    pub suspension_id: String,
    pub command: String,
    pub reason: SuspensionReason,
    pub evidence_source: String,
    pub previous_hash: Option<String>,
    pub entry_hash: String,
}

#[derive(Serialize)]
struct EntryBody<'a> {
    entry_id: &'a str,
    sequence: u64,
    recorded_at: &'a DateTime<Utc>,
    class_id: &'a str,
    suspension_id: &'a str,
    command: &'a str,
    reason: SuspensionReason,
    evidence_source: &'a str,
    previous_hash: Option<&'a str>,
}

impl JournalEntry {
    fn seal(record: &SuspensionRecord, sequence: u64, previous_hash: Option<String>) -> Self {
        let mut entry = Self {
            entry_id: format!("journal-{}", uuid::Uuid::new_v4()),
            sequence,
            recorded_at: Utc::now(),
            class_id: record.class_id.clone(),
            suspension_id: record.suspension_id.clone(),
            command: record.details.triggering_command.clone(),
            reason: record.reason,
            evidence_source: record.details.evidence_source.clone(),
            previous_hash,
            entry_hash: String::new(),
        };
        entry.entry_hash = entry.compute_hash();
        entry
    }

    fn compute_hash(&self) -> String {
        let body = EntryBody {
            entry_id: &self.entry_id,
            sequence: self.sequence,
            recorded_at: &self.recorded_at,
            class_id: &self.class_id,
            suspension_id: &self.suspension_id,
            command: &self.command,
            reason: self.reason,
            evidence_source: &self.evidence_source,
            previous_hash: self.previous_hash.as_deref(),
        };
        let bytes = serde_json::to_vec(&body).expect("serializable");
        blake3::hash(&bytes).to_hex().to_string()
    }

    pub fn verify_hash(&self) -> bool {
        self.entry_hash == self.compute_hash()
    }
}

/// Outcome of walking the journal chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalVerification {
    pub valid: bool,
    pub total_lines: usize,
    pub verified_entries: usize,
    pub first_invalid_line: Option<usize>,
    pub message: Option<String>,
}

/// Sink for suspension journal entries.
#[async_trait]
pub trait OperatorJournal: Send + Sync {
    async fn append(&self, record: &SuspensionRecord) -> GovernanceResult<JournalEntry>;

    /// Last `n` readable entries, newest first.
    async fn tail(&self, n: usize) -> GovernanceResult<Vec<JournalEntry>>;
}

#[derive(Debug, Default)]
struct ChainHead {
    last_hash: Option<String>,
    count: u64,
}

impl ChainHead {
    fn advance(&mut self, entry: &JournalEntry) {
        self.last_hash = Some(entry.entry_hash.clone());
        self.count = entry.sequence;
    }
}

/// In-memory journal for tests.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    entries: Mutex<Vec<JournalEntry>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl OperatorJournal for MemoryJournal {
    async fn append(&self, record: &SuspensionRecord) -> GovernanceResult<JournalEntry> {
        let mut entries = self.entries.lock().await;
        let previous = entries.last().map(|e| e.entry_hash.clone());
        let entry = JournalEntry::seal(record, entries.len() as u64 + 1, previous);
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn tail(&self, n: usize) -> GovernanceResult<Vec<JournalEntry>> {
        let entries = self.entries.lock().await;
        Ok(entries.iter().rev().take(n).cloned().collect())
    }
}

/// File journal with one JSON object per line (`OPERATOR_LOG.jsonl`).
#[derive(Debug)]
pub struct JsonlJournal {
    path: PathBuf,
    head: Mutex<ChainHead>,
}

impl JsonlJournal {
    /// Open (or prepare to create) the journal and recover the chain head.
    pub async fn open(path: impl Into<PathBuf>) -> GovernanceResult<Self> {
        let path = path.into();
        let mut head = ChainHead::default();
        for entry in read_entries(&path).await?.into_iter().flatten() {
            head.advance(&entry);
        }
        Ok(Self {
            path,
            head: Mutex::new(head),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Walk every line, checking entry hashes and chain linkage.
    pub async fn verify(&self) -> GovernanceResult<JournalVerification> {
        let lines = read_entries(&self.path).await?;
        let mut result = JournalVerification {
            valid: true,
            total_lines: lines.len(),
            verified_entries: 0,
            first_invalid_line: None,
            message: None,
        };

        let mut previous: Option<&JournalEntry> = None;
        for (index, line) in lines.iter().enumerate() {
            let failure = match line {
                None => Some("unparseable line".to_string()),
                Some(entry) if !entry.verify_hash() => {
                    Some(format!("entry {} has invalid hash", entry.entry_id))
                }
                Some(entry) => match previous {
                    Some(prev) if entry.previous_hash.as_deref() != Some(prev.entry_hash.as_str()) => {
                        Some(format!("entry {} has broken chain link", entry.entry_id))
                    }
                    _ => None,
                },
            };

            if let Some(message) = failure {
                result.valid = false;
                result.first_invalid_line = Some(index + 1);
                result.message = Some(message);
                return Ok(result);
            }
            previous = line.as_ref();
            result.verified_entries += 1;
        }

        Ok(result)
    }
}

#[async_trait]
impl OperatorJournal for JsonlJournal {
    async fn append(&self, record: &SuspensionRecord) -> GovernanceResult<JournalEntry> {
        let mut head = self.head.lock().await;
        let entry = JournalEntry::seal(record, head.count + 1, head.last_hash.clone());
        let mut line =
            serde_json::to_vec(&entry).map_err(|e| GovernanceError::Journal(e.to_string()))?;
        line.push(b'\n');

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| GovernanceError::Journal(e.to_string()))?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| GovernanceError::Journal(format!("{}: {}", self.path.display(), e)))?;
        file.write_all(&line)
            .await
            .map_err(|e| GovernanceError::Journal(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| GovernanceError::Journal(e.to_string()))?;

        head.advance(&entry);
        Ok(entry)
    }

    async fn tail(&self, n: usize) -> GovernanceResult<Vec<JournalEntry>> {
        let entries = read_entries(&self.path).await?;
        Ok(entries.into_iter().flatten().rev().take(n).collect())
    }
}

/// Non-blank lines of the journal; `None` marks a line that failed to parse.
async fn read_entries(path: &Path) -> GovernanceResult<Vec<Option<JournalEntry>>> {
    let contents = match tokio::fs::read(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(GovernanceError::Journal(format!(
                "{}: {}",
                path.display(),
                e
            )))
        }
    };

    Ok(contents
        .split(|b| *b == b'\n')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .map(|line| serde_json::from_slice(line).ok())
        .collect())
}
