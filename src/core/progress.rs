//! Durable extraction progress with atomic replace semantics.
//!
//! The progress file is JSON of the form `{version, checksum, state}` where
//! `checksum` is the SHA-256 of the serialized `state`. A file that is
//! missing, truncated, of an unknown version, or fails its checksum is
//! treated as "no prior progress".
//!
//! Writes go to a temporary file in the same directory which is synced and
//! then renamed over the active path, so a crash leaves either the previous
//! copy or the new one.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::ExtractError;

/// Default progress file name inside the output directory
pub const PROGRESS_FILE_NAME: &str = "extraction_progress.json";

const FORMAT_VERSION: u32 = 1;

/// Process-wide record of extraction progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Run that created this state
    pub run_id: Uuid,

    /// Items fully processed and persisted
    pub completed: BTreeSet<String>,

    /// Items whose last attempt failed
    pub failed: BTreeSet<String>,

    /// Index of the last batch whose results were committed
    pub last_completed_batch: Option<usize>,

    /// Number of successful items across runs sharing this state
    pub total_processed: u64,

    /// When the first run on this state started
    pub started_at: DateTime<Utc>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressState {
    /// A zero-valued state
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            completed: BTreeSet::new(),
            failed: BTreeSet::new(),
            last_completed_batch: None,
            total_processed: 0,
            started_at: Utc::now(),
        }
    }

    /// Whether any earlier run recorded work in this state
    pub fn has_progress(&self) -> bool {
        self.last_completed_batch.is_some() || !self.completed.is_empty() || !self.failed.is_empty()
    }

    /// Whether an earlier run failed `id` and nothing has completed it since
    pub fn is_failed(&self, id: &str) -> bool {
        self.failed.contains(id)
    }

    pub fn is_completed(&self, id: &str) -> bool {
        self.completed.contains(id)
    }

    /// Whether the batch at `index` was already committed
    pub fn is_batch_done(&self, index: usize) -> bool {
        self.last_completed_batch.is_some_and(|last| index <= last)
    }

    /// Record a success; a success supersedes an earlier failure
    pub fn mark_completed(&mut self, id: &str) {
        self.failed.remove(id);
        if self.completed.insert(id.to_string()) {
            self.total_processed += 1;
        }
    }

    /// Record a failure for an item that has not completed
    pub fn mark_failed(&mut self, id: &str) {
        if !self.completed.contains(id) {
            self.failed.insert(id.to_string());
        }
    }

    /// Advance the batch cursor
    pub fn complete_batch(&mut self, index: usize) {
        self.last_completed_batch = Some(match self.last_completed_batch {
            Some(last) => last.max(index),
            None => index,
        });
    }

    /// SHA-256 of the serialized state, hex encoded
    fn checksum(&self) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

/// On-disk envelope
#[derive(Debug, Serialize, Deserialize)]
struct ProgressFile {
    version: u32,
    checksum: String,
    state: ProgressState,
}

/// File-backed progress store (single writer)
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the default file name inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(PROGRESS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an active progress file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the durable state; missing or corrupt storage yields a fresh state
    pub fn load(&self) -> ProgressState {
        match self.try_load() {
            Ok(Some(state)) => {
                info!(
                    completed = state.completed.len(),
                    failed = state.failed.len(),
                    last_batch = ?state.last_completed_batch,
                    "Loaded extraction progress"
                );
                state
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "No progress file, starting fresh");
                ProgressState::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Discarding progress file");
                ProgressState::new()
            }
        }
    }

    /// Read the durable state, reporting corruption instead of hiding it
    pub fn try_load(&self) -> Result<Option<ProgressState>, ExtractError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ExtractError::ProgressStoreCorruption(e.to_string())),
        };

        let file: ProgressFile = serde_json::from_str(&content)
            .map_err(|e| ExtractError::ProgressStoreCorruption(e.to_string()))?;

        if file.version != FORMAT_VERSION {
            return Err(ExtractError::ProgressStoreCorruption(format!(
                "unsupported format version {}",
                file.version
            )));
        }

        let expected = file
            .state
            .checksum()
            .map_err(|e| ExtractError::ProgressStoreCorruption(e.to_string()))?;
        if expected != file.checksum {
            return Err(ExtractError::ProgressStoreCorruption(
                "checksum mismatch".to_string(),
            ));
        }

        Ok(Some(file.state))
    }

    /// Durably replace the stored state
    pub fn save(&self, state: &ProgressState) -> Result<()> {
        let dir = self.parent_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create progress directory: {}", dir.display()))?;

        let file = ProgressFile {
            version: FORMAT_VERSION,
            checksum: state.checksum().context("Failed to checksum progress state")?,
            state: state.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(content.as_bytes())
            .context("Failed to write progress temp file")?;
        tmp.as_file()
            .sync_all()
            .context("Failed to sync progress temp file")?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace progress file: {}", self.path.display()))?;

        debug!(
            path = %self.path.display(),
            completed = state.completed.len(),
            last_batch = ?state.last_completed_batch,
            "Saved extraction progress"
        );
        Ok(())
    }

    /// Move the active file aside after a full pass.
    ///
    /// The next run then starts fresh instead of finding nothing to do.
    /// Returns the archived path, or `None` when there was no active file.
    pub fn finalize(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| PROGRESS_FILE_NAME.to_string());
        let archived = self.path.with_file_name(format!(
            "{}.completed_{}",
            name,
            Utc::now().format("%Y%m%d_%H%M%S")
        ));

        fs::rename(&self.path, &archived).with_context(|| {
            format!(
                "Failed to archive progress file {} -> {}",
                self.path.display(),
                archived.display()
            )
        })?;

        info!(archived = %archived.display(), "Archived completed progress file");
        Ok(Some(archived))
    }

    /// Take the exclusive single-writer lock for this store
    pub fn lock(&self) -> Result<ProgressLock> {
        let dir = self.parent_dir();
        fs::create_dir_all(&dir)?;

        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

        file.try_lock_exclusive().with_context(|| {
            format!(
                "Another extraction is using {} (lock held on {})",
                self.path.display(),
                lock_path.display()
            )
        })?;

        Ok(ProgressLock { file })
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn parent_dir(&self) -> PathBuf {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Held for the duration of a run; released on drop
#[derive(Debug)]
pub struct ProgressLock {
    file: File,
}

impl Drop for ProgressLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (ProgressStore, TempDir) {
        let temp = TempDir::new().unwrap();
        (ProgressStore::in_dir(temp.path()), temp)
    }

    #[test]
    fn test_missing_file_is_fresh_state() {
        let (store, _temp) = create_test_store();
        let state = store.load();

        assert!(state.completed.is_empty());
        assert!(state.failed.is_empty());
        assert_eq!(state.last_completed_batch, None);
        assert!(store.try_load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let (store, _temp) = create_test_store();
        let mut state = ProgressState::new();
        state.mark_completed("a");
        state.mark_failed("b");
        state.complete_batch(0);

        store.save(&state).unwrap();
        assert_eq!(store.load(), state);
    }

    #[test]
    fn test_truncated_file_is_discarded() {
        let (store, _temp) = create_test_store();
        let mut state = ProgressState::new();
        state.mark_completed("a");
        store.save(&state).unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        fs::write(store.path(), &content[..content.len() / 2]).unwrap();

        assert!(matches!(
            store.try_load(),
            Err(ExtractError::ProgressStoreCorruption(_))
        ));
        assert!(store.load().completed.is_empty());
    }

    #[test]
    fn test_checksum_mismatch_is_discarded() {
        let (store, _temp) = create_test_store();
        let mut state = ProgressState::new();
        state.mark_completed("a");
        store.save(&state).unwrap();

        let tampered = fs::read_to_string(store.path())
            .unwrap()
            .replace("\"a\"", "\"z\"");
        fs::write(store.path(), tampered).unwrap();

        assert!(store.try_load().is_err());
        assert!(store.load().completed.is_empty());
    }

    #[test]
    fn test_completion_clears_failure() {
        let mut state = ProgressState::new();
        state.mark_failed("x");
        assert!(state.failed.contains("x"));

        state.mark_completed("x");
        assert!(state.completed.contains("x"));
        assert!(!state.failed.contains("x"));
        assert_eq!(state.total_processed, 1);

        state.mark_failed("x");
        assert!(!state.failed.contains("x"));
    }

    #[test]
    fn test_batch_cursor() {
        let mut state = ProgressState::new();
        assert!(!state.is_batch_done(0));

        state.complete_batch(0);
        assert!(state.is_batch_done(0));
        assert!(!state.is_batch_done(1));

        state.complete_batch(1);
        assert!(state.is_batch_done(1));
    }

    #[test]
    fn test_finalize_moves_file_aside() {
        let (store, temp) = create_test_store();
        store.save(&ProgressState::new()).unwrap();

        let archived = store.finalize().unwrap().unwrap();
        assert!(!store.exists());
        assert!(archived.exists());
        assert!(archived
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("extraction_progress.json.completed_"));
        assert_eq!(archived.parent().unwrap(), temp.path());

        // Nothing left to archive
        assert!(store.finalize().unwrap().is_none());
        assert!(store.load().completed.is_empty());
    }

    #[test]
    fn test_lock_is_exclusive() {
        let (store, _temp) = create_test_store();
        let guard = store.lock().unwrap();
        assert!(store.lock().is_err());

        drop(guard);
        assert!(store.lock().is_ok());
    }
}
