//! Sink Configuration
//!
//! This module defines configuration for the rotating sink.
//!
//! ## RotationConfig
//!
//! Controls when the live file rolls, how backups are named and retained,
//! and how aggressively writes are flushed to disk:
//!
//! - **max_size_bytes**: Roll when a write would push the live file past this size; 0 disables (default: 0)
//! - **backup_count**: Backups retained after pruning (default: 1)
//! - **compress**: Gzip backups as they are rolled out (default: false)
//! - **date_pattern**: strftime pattern enabling date-then-size rotation (default: none)
//! - **keep_extension**: Put the live file's extension at the end of backup names (default: false)
//! - **separator**: Segment separator inside backup names (default: ".")
//! - **use_lock**: Serialize rolls against cooperating processes (default: false)
//! - **lock_retries**: Lock acquisition attempts before contention fails the write (default: 3)
//! - **sync_threshold_bytes**: Unsynced bytes that force a flush; 0 disables (default: 0)
//! - **sync_interval_ms**: Time since the last flush that forces one, checked on writes; 0 disables (default: 10s)
//! - **open_mode**: Append to or truncate an existing live file at open (default: append)
//! - **file_mode**: Permission bits for created files, unix only (default: 0o600)
//!
//! ## Usage
//!
//! ```ignore
//! use rollsink::RotationConfig;
//!
//! // Size-based rotation, five gzipped backups
//! let config = RotationConfig {
//!     max_size_bytes: 10 * 1024 * 1024,
//!     backup_count: 5,
//!     compress: true,
//!     ..Default::default()
//! };
//!
//! // Daily files, size as a same-day overflow valve
//! let config = RotationConfig {
//!     date_pattern: Some("%Y-%m-%d".to_string()),
//!     max_size_bytes: 512 * 1024 * 1024,
//!     backup_count: 14,
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::date::StrftimePattern;
use crate::error::{Error, Result};

/// How the live file is opened when the sink is constructed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenMode {
    /// Keep existing content and append to it.
    #[default]
    Append,
    /// Discard existing content.
    Truncate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Roll when a write would push the live file past this many bytes;
    /// 0 disables size-triggered rolls (default: 0)
    #[serde(default)]
    pub max_size_bytes: u64,

    /// Backups retained after pruning; 0 means a roll discards the live
    /// file's content instead of keeping a backup (default: 1)
    #[serde(default = "default_backup_count")]
    pub backup_count: usize,

    /// Gzip backups as they are rolled out (default: false)
    #[serde(default)]
    pub compress: bool,

    /// strftime pattern such as `"%Y-%m-%d"`; when set, a date change rolls
    /// the file before size is even considered (default: none)
    #[serde(default)]
    pub date_pattern: Option<String>,

    /// Keep the live file's extension at the end of backup names, i.e.
    /// `app.2024-01-31.1.log` instead of `app.log.2024-01-31.1` (default: false)
    #[serde(default)]
    pub keep_extension: bool,

    /// Separator between segments in backup names (default: ".")
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Serialize the roll cascade against cooperating processes through a
    /// lock file next to the live file (default: false)
    #[serde(default)]
    pub use_lock: bool,

    /// Lock acquisition attempts before a roll fails with contention (default: 3)
    #[serde(default = "default_lock_retries")]
    pub lock_retries: u32,

    /// Unsynced bytes that force a flush; 0 disables the byte trigger (default: 0)
    #[serde(default)]
    pub sync_threshold_bytes: u64,

    /// Time since the last flush that forces one. Checked lazily on writes,
    /// so an idle sink never flushes. Zero disables (default: 10 seconds)
    #[serde(
        default = "default_sync_interval",
        rename = "sync_interval_ms",
        with = "duration_ms"
    )]
    pub sync_interval: Duration,

    /// How the live file is opened at construction (default: append)
    #[serde(default)]
    pub open_mode: OpenMode,

    /// Permission bits for files the sink creates; ignored off unix (default: 0o600)
    #[serde(default = "default_file_mode")]
    pub file_mode: u32,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 0,
            backup_count: default_backup_count(),
            compress: false,
            date_pattern: None,
            keep_extension: false,
            separator: default_separator(),
            use_lock: false,
            lock_retries: default_lock_retries(),
            sync_threshold_bytes: 0,
            sync_interval: default_sync_interval(),
            open_mode: OpenMode::default(),
            file_mode: default_file_mode(),
        }
    }
}

impl RotationConfig {
    /// Reject values that can be checked without touching the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.separator.is_empty() {
            return Err(Error::Config("separator must not be empty".to_string()));
        }
        if let Some(pattern) = &self.date_pattern {
            StrftimePattern::new(pattern)?;
        }
        Ok(())
    }
}

fn default_backup_count() -> usize {
    1
}

fn default_separator() -> String {
    ".".to_string()
}

fn default_lock_retries() -> u32 {
    3
}

fn default_sync_interval() -> Duration {
    Duration::from_millis(10_000) // 10 seconds
}

fn default_file_mode() -> u32 {
    0o600
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
