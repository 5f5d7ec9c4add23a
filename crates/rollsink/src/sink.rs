//! The Rotating Sink
//!
//! A [`RollingSink`] owns one live file and appends caller blocks to it.
//! When policy fires, the live file rolls before the block is written:
//!
//! ```text
//!   write(block)
//!      |
//!      v
//!   policy says roll? --no--> append block --> flush if due
//!      |
//!     yes (under the advisory lock when configured)
//!      |
//!      +-> shift backups: slot N-1 -> N, ..., slot 1 -> 2
//!      +-> move live file into slot 1 (gzip when configured)
//!      +-> reopen a fresh live file, adopt the roll's bucket
//!      +-> prune backups past the retention count (best-effort)
//!      |
//!      v
//!   append block --> flush if due
//! ```
//!
//! Every step before the append either completes or fails the write with
//! nothing appended; pruning and threshold flushes are the exceptions,
//! reported through `tracing` and [`SinkStats`] instead.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{OpenMode, RotationConfig};
use crate::date::{DatePattern, StrftimePattern};
use crate::disk;
use crate::durability::DurabilityController;
use crate::error::{Error, Result};
use crate::lock::{FileLockCoordinator, LockCoordinator};
use crate::namer::BackupNamer;
use crate::policy::{RollTrigger, RotationPolicy};
use crate::retention;

/// Counters a host can scrape. Failures the write path downgrades to
/// warnings stay visible here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Completed rolls since the sink opened.
    pub rolls: u64,
    /// Threshold or interval flushes that failed out-of-band.
    pub flush_failures: u64,
    /// Prune passes that hit at least one error.
    pub cleanup_failures: u64,
}

/// Append-only byte sink over one live file, rolled into retained backups
/// by size or date policy.
///
/// # Lifecycle
///
/// [`open`](RollingSink::open) creates the parent directory, opens the live
/// file, and adopts the size of whatever is already there (append mode).
/// Each [`write`](RollingSink::write) hands the sink one block; the block
/// lands in the current live file or, when policy fires, in a fresh one
/// right after the roll. [`close`](RollingSink::close) flushes once more
/// and releases the handle. Dropping without `close` releases the handle
/// but skips that final flush.
///
/// # Concurrency
///
/// One writer per sink: `write` takes `&mut self`, so a multi-writer host
/// puts the sink behind its own mutex. With `use_lock`, cooperating
/// processes serialize their roll cascades through a lock file; their
/// interleaved appends are still their own problem.
pub struct RollingSink {
    path: PathBuf,
    file: File,
    namer: BackupNamer,
    policy: RotationPolicy,
    clock: Arc<dyn Clock>,
    locking: Option<Arc<dyn LockCoordinator>>,
    durability: DurabilityController,
    config: RotationConfig,
    current_size: u64,
    current_bucket: Option<String>,
    stats: SinkStats,
}

impl RollingSink {
    /// Open with the system clock and the lock-file coordinator.
    pub async fn open(path: impl AsRef<Path>, config: RotationConfig) -> Result<Self> {
        Self::open_with(
            path,
            config,
            Arc::new(SystemClock),
            Arc::new(FileLockCoordinator::new()),
        )
        .await
    }

    /// Open with injected collaborators. Tests drive rotation through a
    /// [`MockClock`](crate::clock::MockClock); embedders can substitute
    /// their own lock coordination. The coordinator is only consulted when
    /// the config sets `use_lock`.
    pub async fn open_with(
        path: impl AsRef<Path>,
        config: RotationConfig,
        clock: Arc<dyn Clock>,
        coordinator: Arc<dyn LockCoordinator>,
    ) -> Result<Self> {
        config.validate()?;
        let path = disk::expand_tilde(path.as_ref());

        disk::ensure_parent_dir(&path)
            .await
            .map_err(|source| Error::DirectoryCreate {
                path: path.clone(),
                source,
            })?;

        let pattern: Option<Arc<dyn DatePattern>> = match &config.date_pattern {
            Some(raw) => Some(Arc::new(StrftimePattern::new(raw)?)),
            None => None,
        };
        let namer = BackupNamer::new(
            &path,
            &config.separator,
            config.keep_extension,
            pattern.as_deref(),
        )?;
        let policy = match pattern {
            Some(pattern) => RotationPolicy::DateThenSize {
                max_size: config.max_size_bytes,
                pattern,
            },
            None => RotationPolicy::SizeTriggered {
                max_size: config.max_size_bytes,
            },
        };

        let truncate = config.open_mode == OpenMode::Truncate;
        let file = disk::open_live(&path, truncate, config.file_mode)
            .await
            .map_err(|source| Error::HandleOpen {
                path: path.clone(),
                source,
            })?;
        let current_size = if truncate {
            0
        } else {
            disk::file_size(&path)
                .await
                .map_err(|source| Error::HandleOpen {
                    path: path.clone(),
                    source,
                })?
                .unwrap_or(0)
        };

        let now = clock.now();
        let current_bucket = policy.initial_bucket(now);
        let durability =
            DurabilityController::new(config.sync_threshold_bytes, config.sync_interval, now);
        let locking = config.use_lock.then_some(coordinator);

        info!(path = %path.display(), size = current_size, "rolling sink opened");

        Ok(Self {
            path,
            file,
            namer,
            policy,
            clock,
            locking,
            durability,
            config,
            current_size,
            current_bucket,
            stats: SinkStats::default(),
        })
    }

    /// Append one block, rolling the live file first when policy demands.
    ///
    /// A failed roll (lock contention, cascade, reopen) fails the write
    /// with nothing appended; the sink stays usable and the next write
    /// re-fires the same trigger, so completed shifts are not repeated and
    /// the failed step is retried.
    pub async fn write(&mut self, block: &[u8]) -> Result<()> {
        let now = self.clock.now();
        let trigger = self.policy.evaluate(
            self.current_size,
            block.len() as u64,
            self.current_bucket.as_deref(),
            now,
        );
        if let Some(trigger) = trigger {
            self.roll(trigger).await?;
        }

        self.file
            .write_all(block)
            .await
            .map_err(|source| Error::Write {
                path: self.path.clone(),
                source,
            })?;
        self.current_size += block.len() as u64;

        if self.durability.record(block.len() as u64, now) {
            self.flush_out_of_band(now).await;
        }
        Ok(())
    }

    /// Flush the live file now. Unlike the threshold-driven flushes this
    /// propagates failure.
    pub async fn sync(&mut self) -> Result<()> {
        self.file
            .sync_data()
            .await
            .map_err(|source| Error::Flush {
                path: self.path.clone(),
                source,
            })?;
        self.durability.mark_synced(self.clock.now());
        Ok(())
    }

    /// Final flush, then release the handle. The flush error, if any, is
    /// returned after the handle is gone.
    pub async fn close(self) -> Result<()> {
        let result = self
            .file
            .sync_data()
            .await
            .map_err(|source| Error::Flush {
                path: self.path.clone(),
                source,
            });
        info!(path = %self.path.display(), size = self.current_size, "rolling sink closed");
        result
    }

    /// Release the handle without the final flush.
    pub fn abort(self) {
        debug!(path = %self.path.display(), "rolling sink aborted");
    }

    /// The live file's path, tilde-expanded.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes in the live file according to the sink's accounting.
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    pub fn stats(&self) -> SinkStats {
        self.stats
    }

    // ========================================================================
    // Rolling
    // ========================================================================

    async fn roll(&mut self, trigger: RollTrigger) -> Result<()> {
        match self.locking.clone() {
            Some(coordinator) => {
                let guard = coordinator
                    .acquire(&self.path, self.config.lock_retries)
                    .await?;
                let result = self.perform_roll(&trigger).await;
                drop(guard);
                result
            }
            None => self.perform_roll(&trigger).await,
        }
    }

    async fn perform_roll(&mut self, trigger: &RollTrigger) -> Result<()> {
        // A date roll files the old content under the new bucket; a size
        // roll stays in the current one. Either way the full shift runs:
        // when a bucket label repeats (hourly patterns, a rewound clock),
        // its existing backups move up a slot instead of being clobbered
        // by the incoming slot-1 move.
        let bucket = match trigger {
            RollTrigger::Size => self.current_bucket.clone(),
            RollTrigger::Date { bucket } => Some(bucket.clone()),
        };
        let label = bucket.as_deref();

        debug!(path = %self.path.display(), trigger = ?trigger, "rolling live file");

        let slots = self.config.backup_count.min(u32::MAX as usize) as u32;
        if slots > 0 {
            // Shift the chain starting from the oldest slot so nothing is
            // clobbered by its own neighbor.
            for index in (1..slots).rev() {
                let from = self.namer.path_for(label, index);
                let to = self.namer.path_for(label, index + 1);
                disk::move_into_slot(&from, &to, self.config.compress)
                    .await
                    .map_err(|source| Error::Cascade {
                        from: from.clone(),
                        to: to.clone(),
                        source,
                    })?;
            }
            let slot_one = self.namer.path_for(label, 1);
            disk::move_into_slot(&self.path, &slot_one, self.config.compress)
                .await
                .map_err(|source| Error::Cascade {
                    from: self.path.clone(),
                    to: slot_one.clone(),
                    source,
                })?;
        } else {
            // Keeping zero backups: the roll discards the live content.
            disk::remove_file_quiet(&self.path)
                .await
                .map_err(|source| Error::Cascade {
                    from: self.path.clone(),
                    to: self.path.clone(),
                    source,
                })?;
        }

        let file = disk::open_live(&self.path, false, self.config.file_mode)
            .await
            .map_err(|source| Error::HandleOpen {
                path: self.path.clone(),
                source,
            })?;
        // Only now that the fresh handle exists does the sink adopt the
        // roll: a reopen failure above leaves size and bucket pointing at
        // the old state, so the next write retries the whole sequence.
        self.file = file;
        self.current_size = 0;
        if let RollTrigger::Date { bucket } = trigger {
            self.current_bucket = Some(bucket.clone());
        }
        self.stats.rolls += 1;
        info!(path = %self.path.display(), rolls = self.stats.rolls, "live file rolled");

        self.prune().await;
        Ok(())
    }

    /// Delete whatever retention says is expired. Every failure in here is
    /// a warning: the roll already succeeded and the bytes are on disk.
    async fn prune(&mut self) {
        let names = match disk::list_file_names(self.namer.dir()).await {
            Ok(names) => names,
            Err(source) => {
                let err = Error::Cleanup {
                    path: self.namer.dir().to_path_buf(),
                    source,
                };
                warn!(error = %err, "skipping backup prune");
                self.stats.cleanup_failures += 1;
                return;
            }
        };

        let backups = names
            .iter()
            .filter_map(|name| {
                self.namer
                    .parse(name)
                    .map(|id| (id, self.namer.dir().join(name)))
            })
            .collect();
        let expired = retention::select_expired(
            backups,
            self.config.backup_count,
            self.policy.date_pattern(),
        );

        let mut failures = 0;
        for path in expired {
            match disk::remove_file_quiet(&path).await {
                Ok(true) => debug!(path = %path.display(), "pruned expired backup"),
                Ok(false) => {} // already gone, same difference
                Err(source) => {
                    let err = Error::Cleanup {
                        path: path.clone(),
                        source,
                    };
                    warn!(error = %err, "could not prune backup");
                    failures += 1;
                }
            }
        }
        self.stats.cleanup_failures += failures;
    }

    async fn flush_out_of_band(&mut self, now: DateTime<Utc>) {
        match self.file.sync_data().await {
            Ok(()) => self.durability.mark_synced(now),
            Err(source) => {
                let err = Error::Flush {
                    path: self.path.clone(),
                    source,
                };
                warn!(error = %err, "out-of-band flush failed");
                self.stats.flush_failures += 1;
            }
        }
    }
}
