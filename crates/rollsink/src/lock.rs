//! Rotation Locking
//!
//! Cooperating processes writing the same live file serialize their roll
//! cascades through an advisory lock file. Only the cascade is locked;
//! block appends never are, so interleaved appends from several processes
//! remain the caller's risk.
//!
//! The lock is the existence of `"{live}.lock"`. A process that crashes
//! mid-roll leaves it behind; operators remove it by hand. Acquisition
//! retries a bounded number of times and then fails the triggering write
//! with [`Error::LockContention`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};

/// Held for the duration of one roll. Releasing is dropping.
#[derive(Debug)]
pub struct LockGuard {
    lock_path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Failure here leaves a stale lock file; there is nowhere better to
        // report it than the next acquirer's contention error.
        let _ = std::fs::remove_file(&self.lock_path);
    }
}

/// Serializes rolls against other processes using the same live file.
#[async_trait]
pub trait LockCoordinator: Send + Sync {
    /// Acquire the rotation lock for `live_path`, making at most `retries`
    /// attempts before giving up with [`Error::LockContention`].
    async fn acquire(&self, live_path: &Path, retries: u32) -> Result<LockGuard>;
}

/// Lock-file coordinator: exclusive creation of `"{live}.lock"`, retried
/// with a fixed delay.
#[derive(Debug, Clone)]
pub struct FileLockCoordinator {
    retry_delay: Duration,
}

impl FileLockCoordinator {
    pub fn new() -> Self {
        Self {
            retry_delay: Duration::from_millis(50),
        }
    }

    pub fn with_retry_delay(retry_delay: Duration) -> Self {
        Self { retry_delay }
    }
}

impl Default for FileLockCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockCoordinator for FileLockCoordinator {
    async fn acquire(&self, live_path: &Path, retries: u32) -> Result<LockGuard> {
        let lock_path = lock_path_for(live_path);
        let attempts = retries.max(1);
        for attempt in 1..=attempts {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await
            {
                Ok(_) => return Ok(LockGuard { lock_path }),
                Err(err) if attempt < attempts => {
                    debug!(
                        lock = %lock_path.display(),
                        attempt,
                        error = %err,
                        "rotation lock busy, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(_) => break,
            }
        }
        Err(Error::LockContention {
            path: live_path.to_path_buf(),
            attempts,
        })
    }
}

fn lock_path_for(live_path: &Path) -> PathBuf {
    let mut name = live_path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}
