//! Approval store: durable suspension state per delegation class.
//!
//! A class with no suspension record is `ACTIVE`. The store is read on every
//! decision and never cached, so a completed write is visible to the next
//! read. Every backend failure surfaces as
//! [`GovernanceError::StoreUnavailable`].

use crate::error::{GovernanceError, GovernanceResult};
use crate::types::{StatusReport, SuspensionRecord};
use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::sync::Mutex;

/// Result of a suspension write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// This write created the suspension.
    Recorded(SuspensionRecord),
    /// The class was already suspended; the existing record is authoritative
    /// and was left untouched.
    AlreadySuspended(SuspensionRecord),
}

impl WriteOutcome {
    pub fn record(&self) -> &SuspensionRecord {
        match self {
            Self::Recorded(r) | Self::AlreadySuspended(r) => r,
        }
    }

    pub fn was_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }
}

/// Storage interface for delegation-class suspension state.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Current status; `ACTIVE` for any class without a suspension record.
    async fn get_status(&self, class_id: &str) -> GovernanceResult<StatusReport>;

    /// Insert-if-absent. Writing to an already-suspended class changes nothing.
    async fn write_suspension(&self, record: SuspensionRecord) -> GovernanceResult<WriteOutcome>;

    /// All current suspensions ordered by class id.
    async fn list_suspensions(&self) -> GovernanceResult<Vec<SuspensionRecord>>;
}

/// In-memory approval store. Not durable; for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryApprovalStore {
    suspensions: RwLock<HashMap<String, SuspensionRecord>>,
}

impl InMemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn get_status(&self, class_id: &str) -> GovernanceResult<StatusReport> {
        let guard = self
            .suspensions
            .read()
            .map_err(|_| GovernanceError::store_read(class_id, "suspensions lock poisoned"))?;
        Ok(match guard.get(class_id) {
            Some(record) => StatusReport::suspended(record.clone()),
            None => StatusReport::active(class_id),
        })
    }

    async fn write_suspension(&self, record: SuspensionRecord) -> GovernanceResult<WriteOutcome> {
        let mut guard = self.suspensions.write().map_err(|_| {
            GovernanceError::store_write(&record.class_id, "suspensions lock poisoned")
        })?;
        if let Some(existing) = guard.get(&record.class_id) {
            return Ok(WriteOutcome::AlreadySuspended(existing.clone()));
        }
        guard.insert(record.class_id.clone(), record.clone());
        Ok(WriteOutcome::Recorded(record))
    }

    async fn list_suspensions(&self) -> GovernanceResult<Vec<SuspensionRecord>> {
        let guard = self
            .suspensions
            .read()
            .map_err(|_| GovernanceError::store_read("*", "suspensions lock poisoned"))?;
        let mut values: Vec<SuspensionRecord> = guard.values().cloned().collect();
        values.sort_by(|a, b| a.class_id.cmp(&b.class_id));
        Ok(values)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    suspensions: BTreeMap<String, SuspensionRecord>,
}

/// JSON-file approval store.
///
/// The whole state lives in one file that is re-read on every call. Writes
/// hold an exclusive advisory lock on a sidecar `<file>.lock` for the whole
/// load-modify-persist, so insert-if-absent holds across processes sharing
/// the file. The new state is written to a unique temp file in the same
/// directory, fsynced, renamed over the store, and the directory is fsynced.
#[derive(Debug)]
pub struct JsonFileApprovalStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileApprovalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sidecar file holding the cross-process write lock.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "approvals".into());
        name.push(".lock");
        self.path.with_file_name(name)
    }

    async fn load(&self) -> Result<StoreData, String> {
        decode(&self.path, tokio::fs::read(&self.path).await)
    }
}

fn decode(path: &Path, read: std::io::Result<Vec<u8>>) -> Result<StoreData, String> {
    match read {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(StoreData::default()),
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| format!("{} is not a valid approval store: {}", path.display(), e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreData::default()),
        Err(e) => Err(format!("{}: {}", path.display(), e)),
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn acquire_lock(lock_path: &Path) -> Result<File, String> {
    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(lock_path)
        .map_err(|e| format!("failed to open store lock {}: {}", lock_path.display(), e))?;
    lock_file
        .lock_exclusive()
        .map_err(|e| format!("failed to acquire store lock {}: {}", lock_path.display(), e))?;
    Ok(lock_file)
}

fn atomic_write(path: &Path, data: &StoreData) -> Result<(), String> {
    let parent = parent_dir(path);
    let bytes = serde_json::to_vec_pretty(data).map_err(|e| e.to_string())?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| format!("create temp file in {}: {}", parent.display(), e))?;
    let tmp_path = tmp.path().to_path_buf();
    let io_err = |e: std::io::Error| format!("{}: {}", tmp_path.display(), e);
    tmp.write_all(&bytes).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path)
        .map_err(|e| format!("{}: {}", path.display(), e.error))?;
    fsync_directory(parent)
}

#[cfg(unix)]
fn fsync_directory(dir: &Path) -> Result<(), String> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| format!("fsync {}: {}", dir.display(), e))
}

#[cfg(not(unix))]
fn fsync_directory(_dir: &Path) -> Result<(), String> {
    Ok(())
}

/// Locked load-modify-persist. Blocking; run off the executor.
fn insert_if_absent(
    path: &Path,
    lock_path: &Path,
    record: SuspensionRecord,
) -> Result<WriteOutcome, String> {
    std::fs::create_dir_all(parent_dir(path))
        .map_err(|e| format!("{}: {}", parent_dir(path).display(), e))?;
    let _lock = acquire_lock(lock_path)?;

    let mut data = decode(path, std::fs::read(path))?;
    if let Some(existing) = data.suspensions.get(&record.class_id) {
        return Ok(WriteOutcome::AlreadySuspended(existing.clone()));
    }
    data.suspensions.insert(record.class_id.clone(), record.clone());
    atomic_write(path, &data)?;
    Ok(WriteOutcome::Recorded(record))
}

#[async_trait]
impl ApprovalStore for JsonFileApprovalStore {
    async fn get_status(&self, class_id: &str) -> GovernanceResult<StatusReport> {
        let data = self
            .load()
            .await
            .map_err(|e| GovernanceError::store_read(class_id, e))?;
        Ok(match data.suspensions.get(class_id) {
            Some(record) => StatusReport::suspended(record.clone()),
            None => StatusReport::active(class_id),
        })
    }

    async fn write_suspension(&self, record: SuspensionRecord) -> GovernanceResult<WriteOutcome> {
        let _guard = self.write_lock.lock().await;
        let class_id = record.class_id.clone();
        let path = self.path.clone();
        let lock_path = self.lock_path();

        tokio::task::spawn_blocking(move || insert_if_absent(&path, &lock_path, record))
            .await
            .map_err(|e| GovernanceError::store_write(&class_id, e))?
            .map_err(|e| GovernanceError::store_write(&class_id, e))
    }

    async fn list_suspensions(&self) -> GovernanceResult<Vec<SuspensionRecord>> {
        let data = self
            .load()
            .await
            .map_err(|e| GovernanceError::store_read("*", e))?;
        Ok(data.suspensions.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApprovalStatus, Evidence, EvidenceKind};
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Arc;

    fn record(class_id: &str, source: &str) -> SuspensionRecord {
        let evidence = Evidence {
            kind: EvidenceKind::ConfidenceRegression,
            source_id: source.to_string(),
            command: "deploy prod".into(),
            regression: json!({"regressed": true, "acknowledged": false}),
        };
        SuspensionRecord::from_evidence(class_id, "deploy prod", &evidence, Utc::now())
    }

    #[tokio::test]
    async fn unknown_class_is_active() {
        let store = InMemoryApprovalStore::new();
        let status = store.get_status("never-seen").await.unwrap();
        assert_eq!(status.status, ApprovalStatus::Active);
        assert!(status.suspension.is_none());
    }

    #[tokio::test]
    async fn first_suspension_is_authoritative() {
        let store = InMemoryApprovalStore::new();
        let first = store.write_suspension(record("c1", "r1")).await.unwrap();
        assert!(first.was_recorded());

        let second = store.write_suspension(record("c1", "r2")).await.unwrap();
        assert!(!second.was_recorded());
        assert_eq!(second.record().details.evidence_source, "r1");

        let status = store.get_status("c1").await.unwrap();
        assert_eq!(status.status, ApprovalStatus::Suspended);
        assert_eq!(status.suspension.unwrap().details.evidence_source, "r1");
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("approvals.json");

        {
            let store = JsonFileApprovalStore::new(&path);
            assert!(!store.get_status("c1").await.unwrap().is_suspended());
            store.write_suspension(record("c1", "r1")).await.unwrap();
        }

        let reopened = JsonFileApprovalStore::new(&path);
        let status = reopened.get_status("c1").await.unwrap();
        assert!(status.is_suspended());
        let stored = status.suspension.unwrap();
        assert_eq!(stored.details.evidence_source, "r1");
        assert!(stored.verify_digest());
        assert!(!reopened.get_status("c2").await.unwrap().is_suspended());
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn file_store_read_after_write_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("approvals.json");
        let writer = JsonFileApprovalStore::new(&path);
        let reader = JsonFileApprovalStore::new(&path);

        assert!(!reader.get_status("c1").await.unwrap().is_suspended());
        writer.write_suspension(record("c1", "r1")).await.unwrap();
        assert!(reader.get_status("c1").await.unwrap().is_suspended());
    }

    #[tokio::test]
    async fn file_store_concurrent_writers_keep_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileApprovalStore::new(dir.path().join("approvals.json")));

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.write_suspension(record("c1", &format!("r{}", i))).await.unwrap()
            }));
        }
        let mut recorded = 0;
        for handle in handles {
            if handle.await.unwrap().was_recorded() {
                recorded += 1;
            }
        }
        assert_eq!(recorded, 1);
        assert_eq!(store.list_suspensions().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn separate_handles_never_lose_each_others_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("approvals.json");

        for round in 0..50 {
            let a = Arc::new(JsonFileApprovalStore::new(&path));
            let b = Arc::new(JsonFileApprovalStore::new(&path));
            let c1 = format!("c1-{}", round);
            let c2 = format!("c2-{}", round);

            let first = {
                let (a, c1) = (a.clone(), c1.clone());
                tokio::spawn(async move { a.write_suspension(record(&c1, "r1")).await })
            };
            let second = {
                let (b, c2) = (b.clone(), c2.clone());
                tokio::spawn(async move { b.write_suspension(record(&c2, "r2")).await })
            };
            assert!(first.await.unwrap().unwrap().was_recorded());
            assert!(second.await.unwrap().unwrap().was_recorded());

            assert!(a.get_status(&c2).await.unwrap().is_suspended());
            assert!(b.get_status(&c1).await.unwrap().is_suspended());
        }

        let store = JsonFileApprovalStore::new(&path);
        assert_eq!(store.list_suspensions().await.unwrap().len(), 100);
    }

    #[tokio::test]
    async fn writes_leave_only_store_and_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileApprovalStore::new(dir.path().join("approvals.json"));
        store.write_suspension(record("c1", "r1")).await.unwrap();
        store.write_suspension(record("c2", "r1")).await.unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["approvals.json", "approvals.json.lock"]);
        assert_eq!(store.lock_path(), dir.path().join("approvals.json.lock"));
    }

    #[tokio::test]
    async fn corrupt_store_file_is_unavailable_not_active() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("approvals.json");
        std::fs::write(&path, b"{\"suspensions\": {\"c1\": ").unwrap();

        let store = JsonFileApprovalStore::new(&path);
        let err = store.get_status("c1").await.unwrap_err();
        assert!(err.is_store_unavailable());
        let err = store.write_suspension(record("c1", "r1")).await.unwrap_err();
        assert!(err.is_store_unavailable());
    }

    #[tokio::test]
    async fn unreadable_store_path_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the store file should be.
        let store = JsonFileApprovalStore::new(dir.path());
        assert!(store.get_status("c1").await.unwrap_err().is_store_unavailable());
    }

    #[tokio::test]
    async fn empty_store_file_is_all_active() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("approvals.json");
        std::fs::write(&path, b"\n").unwrap();
        let store = JsonFileApprovalStore::new(&path);
        assert!(!store.get_status("c1").await.unwrap().is_suspended());
        assert!(store.list_suspensions().await.unwrap().is_empty());
    }
}
