//! Deduplication store
//!
//! Tracks report identities already processed in prior runs. Filtering
//! and durable recording are separate steps: `filter_new` remembers the
//! surviving identities as pending, and `commit` persists them only
//! after the caller confirms the run result was delivered. A crash or
//! delivery failure before commit re-surfaces the same reports on the
//! next run (at-least-once), which downstream must tolerate.

use crate::error::PersistenceError;
use crate::model::ReportIdentity;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Persistence backend for the seen-set
///
/// Implementations provide load/commit over some medium; the store only
/// needs whole-set read-then-overwrite semantics.
pub trait SeenBackend {
    /// Load all previously recorded keys
    fn load(&mut self) -> Result<HashSet<String>, PersistenceError>;

    /// Durably record the full key set
    fn commit(&mut self, keys: &HashSet<String>) -> Result<(), PersistenceError>;
}

/// In-memory backend for tests
#[derive(Debug, Default)]
pub struct MemoryBackend {
    keys: HashSet<String>,
}

impl MemoryBackend {
    /// Empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed key set, for assertions
    pub fn keys(&self) -> &HashSet<String> {
        &self.keys
    }
}

impl SeenBackend for MemoryBackend {
    fn load(&mut self) -> Result<HashSet<String>, PersistenceError> {
        Ok(self.keys.clone())
    }

    fn commit(&mut self, keys: &HashSet<String>) -> Result<(), PersistenceError> {
        self.keys = keys.clone();
        Ok(())
    }
}

/// JSON-file backend with an exclusive lock file.
///
/// The lock enforces single-writer discipline: a second run opening the
/// same store fails with [`PersistenceError::Locked`] instead of
/// corrupting the seen-set. The lock records the holder's PID, and a
/// lock whose holder is no longer alive (killed run) is reclaimed.
/// Commits write a sibling temp file and rename it into place.
pub struct JsonFileBackend {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFileBackend {
    /// Open the store at `path`, acquiring its lock file
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| PersistenceError::Io {
                    path: parent.display().to_string(),
                    source: e,
                })?;
            }
        }

        let lock_path = PathBuf::from(format!("{}.lock", path.display()));
        Self::acquire_lock(&lock_path)?;

        Ok(Self { path, lock_path })
    }

    fn acquire_lock(lock_path: &Path) -> Result<(), PersistenceError> {
        for attempt in 0..2 {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(lock_path)
            {
                Ok(mut file) => {
                    let _ = write!(file, "{}", std::process::id());
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if attempt == 0 && lock_is_stale(lock_path) {
                        warn!("Reclaiming stale lock at {}", lock_path.display());
                        let _ = fs::remove_file(lock_path);
                        continue;
                    }
                    return Err(PersistenceError::Locked(lock_path.display().to_string()));
                }
                Err(e) => {
                    return Err(PersistenceError::Io {
                        path: lock_path.display().to_string(),
                        source: e,
                    });
                }
            }
        }
        Err(PersistenceError::Locked(lock_path.display().to_string()))
    }
}

/// Whether the lock's recorded holder is gone. Unreadable content is
/// treated as live so a holder mid-write is never evicted.
fn lock_is_stale(lock_path: &Path) -> bool {
    let Ok(contents) = fs::read_to_string(lock_path) else {
        return false;
    };
    match contents.trim().parse::<u32>() {
        Ok(pid) => !process_alive(pid),
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

impl Drop for JsonFileBackend {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

impl SeenBackend for JsonFileBackend {
    fn load(&mut self) -> Result<HashSet<String>, PersistenceError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => {
                return Err(PersistenceError::Io {
                    path: self.path.display().to_string(),
                    source: e,
                });
            }
        };
        let keys: Vec<String> =
            serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Corrupt {
                path: self.path.display().to_string(),
                detail: e.to_string(),
            })?;
        Ok(keys.into_iter().collect())
    }

    fn commit(&mut self, keys: &HashSet<String>) -> Result<(), PersistenceError> {
        let mut sorted: Vec<&String> = keys.iter().collect();
        sorted.sort();
        let bytes = serde_json::to_vec_pretty(&sorted).map_err(|e| PersistenceError::Corrupt {
            path: self.path.display().to_string(),
            detail: e.to_string(),
        })?;

        let tmp_path = PathBuf::from(format!("{}.tmp", self.path.display()));
        fs::write(&tmp_path, bytes).map_err(|e| PersistenceError::Io {
            path: tmp_path.display().to_string(),
            source: e,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|e| PersistenceError::Io {
            path: self.path.display().to_string(),
            source: e,
        })?;
        Ok(())
    }
}

/// Seen-set store over an injected backend
pub struct SeenStore<B: SeenBackend> {
    backend: B,
    seen: HashSet<String>,
    pending: Vec<ReportIdentity>,
}

impl<B: SeenBackend> SeenStore<B> {
    /// Load the store from its backend
    pub fn new(mut backend: B) -> Result<Self, PersistenceError> {
        let seen = backend.load()?;
        info!("Loaded seen-set with {} entries", seen.len());
        Ok(Self {
            backend,
            seen,
            pending: Vec::new(),
        })
    }

    /// Identities not yet seen, in input order, intra-batch duplicates
    /// removed. The returned identities are remembered as pending until
    /// [`SeenStore::commit`].
    pub fn filter_new(&mut self, candidates: &[ReportIdentity]) -> Vec<ReportIdentity> {
        let mut batch_keys = HashSet::new();
        let fresh: Vec<ReportIdentity> = candidates
            .iter()
            .filter(|id| {
                let key = id.key();
                !self.seen.contains(&key) && batch_keys.insert(key)
            })
            .cloned()
            .collect();
        debug!(
            "{} of {} candidates are new",
            fresh.len(),
            candidates.len()
        );
        self.pending = fresh.clone();
        fresh
    }

    /// Durably record the pending identities as seen.
    ///
    /// Atomic over the whole batch; called only after the run result was
    /// delivered. A no-op when nothing is pending.
    pub fn commit(&mut self) -> Result<(), PersistenceError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        for id in &self.pending {
            self.seen.insert(id.key());
        }
        self.backend.commit(&self.seen)?;
        info!("Committed {} identities to seen-set", self.pending.len());
        self.pending.clear();
        Ok(())
    }

    /// Whether an identity has been committed as seen
    pub fn contains(&self, identity: &ReportIdentity) -> bool {
        self.seen.contains(&identity.key())
    }

    /// Number of committed entries
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether the seen-set is empty
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn identity(id: &str) -> ReportIdentity {
        ReportIdentity {
            filer_name: "Doe, Jane".to_string(),
            filer_id: id.to_string(),
            report_date: NaiveDate::from_ymd_opt(2026, 8, 30).unwrap(),
            report_url: format!("https://efdsearch.senate.gov/search/view/ptr/{id}/"),
        }
    }

    #[test]
    fn test_filter_commit_filter_is_idempotent() {
        let mut store = SeenStore::new(MemoryBackend::new()).unwrap();
        let batch = vec![identity("a"), identity("b")];

        let first = store.filter_new(&batch);
        assert_eq!(first.len(), 2);

        store.commit().unwrap();

        let second = store.filter_new(&batch);
        assert!(second.is_empty());
    }

    #[test]
    fn test_filter_without_commit_returns_full_set_again() {
        let mut store = SeenStore::new(MemoryBackend::new()).unwrap();
        let batch = vec![identity("a")];

        assert_eq!(store.filter_new(&batch).len(), 1);
        // No commit: the run failed to deliver, so nothing is marked seen
        assert_eq!(store.filter_new(&batch).len(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_filter_preserves_order_and_drops_batch_duplicates() {
        let mut store = SeenStore::new(MemoryBackend::new()).unwrap();
        let batch = vec![identity("c"), identity("a"), identity("c"), identity("b")];

        let fresh = store.filter_new(&batch);
        let ids: Vec<&str> = fresh.iter().map(|i| i.filer_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_partially_seen_batch() {
        let mut store = SeenStore::new(MemoryBackend::new()).unwrap();
        store.filter_new(&[identity("a")]);
        store.commit().unwrap();

        let fresh = store.filter_new(&[identity("a"), identity("b")]);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].filer_id, "b");

        store.commit().unwrap();
        assert!(store.contains(&identity("a")));
        assert!(store.contains(&identity("b")));
    }

    #[test]
    fn test_file_backend_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen_reports.json");

        {
            let backend = JsonFileBackend::open(&path).unwrap();
            let mut store = SeenStore::new(backend).unwrap();
            store.filter_new(&[identity("a")]);
            store.commit().unwrap();
        }

        let backend = JsonFileBackend::open(&path).unwrap();
        let mut store = SeenStore::new(backend).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.filter_new(&[identity("a")]).is_empty());
    }

    #[test]
    fn test_file_backend_lock_excludes_second_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen_reports.json");

        let _first = JsonFileBackend::open(&path).unwrap();
        let second = JsonFileBackend::open(&path);
        assert!(matches!(second, Err(PersistenceError::Locked(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_stale_lock_from_dead_holder_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen_reports.json");
        let lock = dir.path().join("seen_reports.json.lock");
        // Far above any live PID
        fs::write(&lock, "999999999").unwrap();

        let backend = JsonFileBackend::open(&path).unwrap();
        drop(backend);
        assert!(!lock.exists());
    }

    #[test]
    fn test_unreadable_lock_content_stays_locked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen_reports.json");
        let lock = dir.path().join("seen_reports.json.lock");
        fs::write(&lock, "not a pid").unwrap();

        assert!(matches!(
            JsonFileBackend::open(&path),
            Err(PersistenceError::Locked(_))
        ));
    }

    #[test]
    fn test_file_backend_lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen_reports.json");

        drop(JsonFileBackend::open(&path).unwrap());
        assert!(JsonFileBackend::open(&path).is_ok());
    }

    #[test]
    fn test_file_backend_corrupt_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen_reports.json");
        fs::write(&path, b"not json").unwrap();

        let mut backend = JsonFileBackend::open(&path).unwrap();
        assert!(matches!(
            backend.load(),
            Err(PersistenceError::Corrupt { .. })
        ));
    }
}
