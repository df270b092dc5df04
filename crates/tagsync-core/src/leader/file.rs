use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use tracing::warn;

use super::{LeaseBackend, LeaseError, LeaseState};
use crate::clock::unix_ms;

/// Lock files older than this are considered abandoned by a crashed process.
const STALE_LOCK: Duration = Duration::from_secs(30);
const LOCK_ATTEMPTS: u32 = 50;
const LOCK_RETRY: Duration = Duration::from_millis(20);

/// Lease record kept in a JSON file on storage shared by the fleet.
///
/// Every read-modify-write runs under an exclusive `<path>.lock` file created with `O_EXCL`,
/// and the record itself is replaced atomically through a rename.
#[derive(Debug, Clone)]
pub struct FileLeaseBackend {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileLeaseBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock = path.clone().into_os_string();
        lock.push(".lock");
        Self {
            path,
            lock_path: PathBuf::from(lock),
        }
    }

    /// Lease file for a `namespace/name` pair inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>, namespace: &str, name: &str) -> Self {
        Self::new(dir.as_ref().join(format!("{namespace}.{name}.lease")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current lease record, if any.
    pub async fn read(&self) -> Result<Option<LeaseState>, LeaseError> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|e| LeaseError::Corrupt(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable(&self.path, e)),
        }
    }

    async fn write(&self, state: &LeaseState) -> Result<(), LeaseError> {
        let body = serde_json::to_vec(state).map_err(|e| LeaseError::Corrupt(e.to_string()))?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| unavailable(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| unavailable(&self.path, e))
    }

    async fn lock(&self) -> Result<LockGuard, LeaseError> {
        for _ in 0..LOCK_ATTEMPTS {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.lock_path)
                .await
            {
                Ok(_) => {
                    return Ok(LockGuard {
                        path: self.lock_path.clone(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if self.lock_is_stale().await {
                        warn!(lock = %self.lock_path.display(), "removing stale lease lock");
                        let _ = tokio::fs::remove_file(&self.lock_path).await;
                        continue;
                    }
                    tokio::time::sleep(LOCK_RETRY).await;
                }
                Err(e) => return Err(unavailable(&self.lock_path, e)),
            }
        }
        Err(LeaseError::Unavailable(format!(
            "{}: lock is busy",
            self.lock_path.display()
        )))
    }

    async fn lock_is_stale(&self) -> bool {
        let Ok(meta) = tokio::fs::metadata(&self.lock_path).await else {
            return false;
        };
        meta.modified()
            .ok()
            .and_then(|at| SystemTime::now().duration_since(at).ok())
            .is_some_and(|age| age > STALE_LOCK)
    }
}

/// Removes the lock file when dropped.
struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn unavailable(path: &Path, e: std::io::Error) -> LeaseError {
    LeaseError::Unavailable(format!("{}: {e}", path.display()))
}

fn expiry(ttl: Duration) -> u64 {
    unix_ms().saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
}

#[async_trait]
impl LeaseBackend for FileLeaseBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn try_acquire(&self, holder: &str, ttl: Duration) -> Result<bool, LeaseError> {
        let _lock = self.lock().await?;

        let free = match self.read().await {
            Ok(None) => true,
            Ok(Some(state)) => state.holder == holder || state.is_expired(unix_ms()),
            Err(LeaseError::Corrupt(reason)) => {
                warn!(%reason, "overwriting corrupt lease record");
                true
            }
            Err(e) => return Err(e),
        };
        if !free {
            return Ok(false);
        }

        self.write(&LeaseState {
            holder: holder.to_string(),
            expires_at_ms: expiry(ttl),
        })
        .await?;
        Ok(true)
    }

    async fn renew(&self, holder: &str, ttl: Duration) -> Result<bool, LeaseError> {
        let _lock = self.lock().await?;

        match self.read().await? {
            Some(state) if state.holder == holder => {
                self.write(&LeaseState {
                    holder: state.holder,
                    expires_at_ms: expiry(ttl),
                })
                .await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, holder: &str) -> Result<(), LeaseError> {
        let _lock = self.lock().await?;

        match self.read().await? {
            Some(state) if state.holder == holder => tokio::fs::remove_file(&self.path)
                .await
                .map_err(|e| unavailable(&self.path, e)),
            _ => Ok(()),
        }
    }
}
