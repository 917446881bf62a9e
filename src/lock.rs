//! Run locking.
//!
//! A teardown must never run twice at once: two runs racing over the same
//! chain would interleave deletes and waits. When the hosting environment does
//! not guarantee a single concurrent invocation, a file lock in a shared
//! directory does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LockConfig;
use crate::error::{LockError, Result, TeardownError};

/// Lock file name.
const LOCK_FILE: &str = "teardown.lock";

/// Upper bound applied to configured expiries.
const MAX_EXPIRY_SECS: i64 = 31_536_000;

/// Information about a held lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Unique lock identifier.
    pub lock_id: String,
    /// Who holds the lock.
    pub holder: String,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the lock may be taken over.
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    /// Creates lock info for `holder`, valid for `expiry`.
    #[must_use]
    pub fn new(holder: &str, expiry: Duration) -> Self {
        let now = Utc::now();
        let expiry = chrono::Duration::from_std(expiry)
            .unwrap_or_else(|_| chrono::Duration::seconds(MAX_EXPIRY_SECS))
            .min(chrono::Duration::seconds(MAX_EXPIRY_SECS));

        Self {
            lock_id: Uuid::new_v4().to_string(),
            holder: holder.to_string(),
            acquired_at: now,
            expires_at: now + expiry,
        }
    }

    /// Checks if the lock has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Returns the remaining time until expiry in seconds.
    #[must_use]
    pub fn remaining_secs(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }
}

/// File lock guarding a teardown run.
#[derive(Debug, Clone)]
pub struct RunLock {
    dir: PathBuf,
    path: PathBuf,
    expiry: Duration,
}

impl RunLock {
    /// Creates a lock living in `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, expiry: Duration) -> Self {
        let dir = dir.into();
        let path = dir.join(LOCK_FILE);
        Self { dir, path, expiry }
    }

    /// Creates a lock from configuration.
    #[must_use]
    pub fn from_config(config: &LockConfig) -> Self {
        Self::new(&config.path, Duration::from_secs(config.expiry_secs))
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquires the lock for `holder`.
    ///
    /// # Errors
    ///
    /// Returns `LockError::HeldByOther` if an unexpired lock exists,
    /// `LockError::Corrupted` if the lock file is unreadable and was written
    /// within the expiry window, or an IO error if the lock file cannot be
    /// handled.
    pub async fn acquire(&self, holder: &str) -> Result<LockInfo> {
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            LockError::io(format!("Failed to create lock directory {}: {e}", self.dir.display()))
        })?;

        let info = LockInfo::new(holder, self.expiry);

        if self.try_create(&info).await? {
            info!(
                "Acquired run lock: {} (expires in {}s)",
                info.lock_id,
                info.remaining_secs()
            );
            return Ok(info);
        }

        if let Some(existing) = self.existing_or_stale().await? {
            if !existing.is_expired() {
                return Err(LockError::HeldByOther {
                    holder: existing.holder,
                    since: existing.acquired_at.to_rfc3339(),
                }
                .into());
            }
            warn!(
                "Expired run lock held by {} found, taking over",
                existing.holder
            );
        }

        self.remove_file().await?;

        if self.try_create(&info).await? {
            info!("Acquired run lock: {}", info.lock_id);
            Ok(info)
        } else {
            // Someone else won the race after the stale lock was removed.
            let (holder, since) = self.current().await?.map_or_else(
                || (String::from("unknown"), Utc::now()),
                |i| (i.holder, i.acquired_at),
            );
            Err(LockError::HeldByOther {
                holder,
                since: since.to_rfc3339(),
            }
            .into())
        }
    }

    /// Releases the lock if it is still held under `info`'s id.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be read or removed.
    pub async fn release(&self, info: &LockInfo) -> Result<()> {
        match self.current().await? {
            Some(existing) if existing.lock_id == info.lock_id => {
                self.remove_file().await?;
                info!("Released run lock: {}", info.lock_id);
            }
            Some(existing) => {
                warn!(
                    "Lock ID mismatch: expected {}, found {}",
                    info.lock_id, existing.lock_id
                );
            }
            None => debug!("Run lock already released"),
        }
        Ok(())
    }

    /// Reads the current lock, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file exists but cannot be read or parsed.
    pub async fn current(&self) -> Result<Option<LockInfo>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LockError::io(format!("Failed to read lock file: {e}")).into()),
        };

        let info = serde_json::from_str(&content).map_err(|e| LockError::Corrupted {
            message: format!("{}: {e}", self.path.display()),
        })?;

        Ok(Some(info))
    }

    /// Checks whether an unexpired lock is held.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be read.
    pub async fn is_locked(&self) -> Result<bool> {
        Ok(self.current().await?.is_some_and(|i| !i.is_expired()))
    }

    /// Reads the existing lock for a takeover decision.
    ///
    /// An unreadable lock file whose last write is older than the expiry is
    /// left behind by a crashed writer and counts as stale (`None`).
    async fn existing_or_stale(&self) -> Result<Option<LockInfo>> {
        match self.current().await {
            Err(TeardownError::Lock(LockError::Corrupted { message })) => {
                let age = self.file_age().await?;
                if age < self.expiry {
                    return Err(LockError::Corrupted { message }.into());
                }
                warn!(
                    "Unreadable run lock untouched for {}s found, taking over: {message}",
                    age.as_secs()
                );
                Ok(None)
            }
            other => other,
        }
    }

    /// Time since the lock file was last modified.
    async fn file_age(&self) -> Result<Duration> {
        let modified = fs::metadata(&self.path)
            .await
            .and_then(|meta| meta.modified())
            .map_err(|e| LockError::io(format!("Failed to stat lock file: {e}")))?;

        Ok(modified.elapsed().unwrap_or_default())
    }

    /// Creates the lock file exclusively. Returns false if it already exists.
    ///
    /// The content is written and synced to a private temp file first, then
    /// hard-linked into place, so the lock file never exists half-written.
    async fn try_create(&self, info: &LockInfo) -> Result<bool> {
        let content = serde_json::to_string_pretty(info)
            .map_err(|e| LockError::io(format!("Failed to serialize lock: {e}")))?;

        let tmp = self.dir.join(format!("{LOCK_FILE}.{}.tmp", info.lock_id));
        let written = Self::write_synced(&tmp, content.as_bytes()).await;
        let linked = match written {
            Ok(()) => match fs::hard_link(&tmp, &self.path).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
                Err(e) => Err(LockError::io(format!("Failed to create lock file: {e}")).into()),
            },
            Err(e) => Err(e),
        };

        if let Err(e) = fs::remove_file(&tmp).await {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove temporary lock file {}: {e}", tmp.display());
            }
        }

        linked
    }

    async fn write_synced(path: &Path, content: &[u8]) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| LockError::io(format!("Failed to create lock file: {e}")))?;

        file.write_all(content)
            .await
            .map_err(|e| LockError::io(format!("Failed to write lock file: {e}")))?;
        file.sync_all()
            .await
            .map_err(|e| LockError::io(format!("Failed to sync lock file: {e}")))?;

        Ok(())
    }

    async fn remove_file(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::io(format!("Failed to delete lock file: {e}")).into()),
        }
    }
}

/// Generates a unique holder identifier for the current process.
#[must_use]
pub fn generate_holder_id() -> String {
    let hostname = hostname::get()
        .map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().to_string());
    let pid = std::process::id();
    let uuid = Uuid::new_v4().simple().to_string();

    format!("{hostname}-{pid}-{}", &uuid[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_acquire_and_release() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::new(dir.path(), HOUR);

        let info = lock.acquire("runner-a").await.unwrap();
        assert_eq!(info.holder, "runner-a");
        assert!(lock.is_locked().await.unwrap());
        assert!(lock.path().exists());

        lock.release(&info).await.unwrap();
        assert!(!lock.is_locked().await.unwrap());
        assert!(!lock.path().exists());
    }

    #[tokio::test]
    async fn test_second_acquire_is_rejected() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::new(dir.path(), HOUR);

        let _held = lock.acquire("runner-a").await.unwrap();
        let err = lock.acquire("runner-b").await.unwrap_err();

        match err {
            TeardownError::Lock(LockError::HeldByOther { holder, .. }) => {
                assert_eq!(holder, "runner-a");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_expired_lock_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::new(dir.path(), HOUR);

        let mut stale = LockInfo::new("crashed-runner", HOUR);
        stale.expires_at = Utc::now() - chrono::Duration::seconds(1);
        std::fs::write(lock.path(), serde_json::to_string(&stale).unwrap()).unwrap();
        assert!(!lock.is_locked().await.unwrap());

        let info = lock.acquire("runner-b").await.unwrap();
        assert_eq!(info.holder, "runner-b");
        assert_eq!(lock.current().await.unwrap(), Some(info));
    }

    #[tokio::test]
    async fn test_release_with_foreign_id_keeps_lock() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::new(dir.path(), HOUR);

        let held = lock.acquire("runner-a").await.unwrap();
        let foreign = LockInfo::new("runner-b", HOUR);

        lock.release(&foreign).await.unwrap();
        assert_eq!(lock.current().await.unwrap(), Some(held));
    }

    #[tokio::test]
    async fn test_corrupted_lock_file() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::new(dir.path(), HOUR);
        std::fs::write(lock.path(), "not json").unwrap();

        let err = lock.acquire("runner-a").await.unwrap_err();
        assert!(matches!(err, TeardownError::Lock(LockError::Corrupted { .. })));
    }

    #[tokio::test]
    async fn test_fresh_empty_lock_file_blocks() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::new(dir.path(), HOUR);
        std::fs::write(lock.path(), "").unwrap();

        let err = lock.acquire("runner-a").await.unwrap_err();
        assert!(matches!(err, TeardownError::Lock(LockError::Corrupted { .. })));
        assert!(lock.path().exists());
    }

    #[tokio::test]
    async fn test_stale_empty_lock_file_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::new(dir.path(), HOUR);
        let file = std::fs::File::create(lock.path()).unwrap();
        file.set_modified(SystemTime::now() - 2 * HOUR).unwrap();
        drop(file);

        let info = lock.acquire("runner-a").await.unwrap();
        assert_eq!(lock.current().await.unwrap(), Some(info));
    }

    #[tokio::test]
    async fn test_acquire_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::new(dir.path(), HOUR);

        let _held = lock.acquire("runner-a").await.unwrap();
        assert!(lock.acquire("runner-b").await.is_err());

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![String::from(LOCK_FILE)]);
    }

    #[tokio::test]
    async fn test_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::new(dir.path().join("nested/locks"), HOUR);

        let info = lock.acquire("runner-a").await.unwrap();
        assert!(lock.path().exists());
        lock.release(&info).await.unwrap();
    }

    #[test]
    fn test_from_config() {
        let config = LockConfig {
            path: String::from("/var/lock/teardown"),
            expiry_secs: 60,
        };
        let lock = RunLock::from_config(&config);
        assert_eq!(lock.path(), Path::new("/var/lock/teardown/teardown.lock"));
    }

    #[test]
    fn test_lock_info_expiry() {
        let info = LockInfo::new("holder", HOUR);
        assert!(!info.is_expired());
        assert!(info.remaining_secs() > 3500);

        let huge = LockInfo::new("holder", Duration::from_secs(u64::MAX));
        assert!(!huge.is_expired());
    }

    #[test]
    fn test_holder_id_generation() {
        let id1 = generate_holder_id();
        let id2 = generate_holder_id();

        assert_ne!(id1, id2);
        assert!(id1.contains(&format!("-{}-", std::process::id())));
    }
}
