//! Sink Error Types
//!
//! This module defines all error types that can occur while writing to or
//! rotating the live file.
//!
//! ## Error Categories
//!
//! ### Fatal to the operation that hit them
//! - `DirectoryCreate`: Parent directory could not be created at open
//! - `HandleOpen`: Live file could not be opened or reopened after a roll
//! - `Write`: Appending a block to the live file failed
//! - `Cascade`: A rename or compress step inside a roll failed; the roll is
//!   abandoned and the backup chain may be partially shifted
//! - `LockContention`: The advisory rotation lock stayed busy through every
//!   configured attempt; the triggering write fails with nothing appended
//!
//! ### Reported out-of-band on the write path
//! - `Flush`: A durability flush failed. Threshold and interval flushes log
//!   this and bump a counter instead of failing the write; explicit
//!   [`sync`](crate::RollingSink::sync) and the final flush in
//!   [`close`](crate::RollingSink::close) return it
//! - `Cleanup`: Pruning expired backups failed (including listing the
//!   directory). Never fails a write; the roll already succeeded
//!
//! ### Configuration
//! - `DatePattern`: The configured date pattern has an unsupported specifier
//! - `Config`: Some other statically-checkable config value is invalid
//!
//! ## Usage
//!
//! All sink operations return `Result<T>` which is aliased to
//! `Result<T, Error>`. This allows clean error propagation with `?`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Directory creation failed for {}: {source}", .path.display())]
    DirectoryCreate { path: PathBuf, source: io::Error },

    #[error("Could not open live file {}: {source}", .path.display())]
    HandleOpen { path: PathBuf, source: io::Error },

    #[error("Write to {} failed: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("Rotation cascade failed moving {} to {}: {source}", .from.display(), .to.display())]
    Cascade {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("Backup cleanup failed for {}: {source}", .path.display())]
    Cleanup { path: PathBuf, source: io::Error },

    #[error("Flush of {} failed: {source}", .path.display())]
    Flush { path: PathBuf, source: io::Error },

    #[error("Rotation lock for {} still busy after {attempts} attempts", .path.display())]
    LockContention { path: PathBuf, attempts: u32 },

    #[error("Invalid date pattern {pattern:?}: {reason}")]
    DatePattern { pattern: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}
