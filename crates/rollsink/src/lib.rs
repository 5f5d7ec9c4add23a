//! # rollsink
//!
//! A rotating-file write sink: callers append byte blocks to one *live
//! file*; the sink rolls that file into a family of retained backups when
//! a rotation policy fires.
//!
//! ## Rotation
//!
//! Two policies, chosen by configuration:
//!
//! - **Size**: a write that would push the live file past `max_size_bytes`
//!   rolls first. An empty live file accepts any block, so a single block
//!   larger than the limit lands whole and rolls out on the next write.
//! - **Date then size**: with a `date_pattern` such as `"%Y-%m-%d"`, a
//!   change of the rendered date bucket rolls unconditionally and the
//!   backup carries the *new* bucket's label; within a bucket, size acts
//!   as an overflow valve and backups stay under the current label.
//!
//! A roll shifts existing backups up one slot (`.1` becomes `.2` and so
//! on), moves the live file into slot 1 (gzipped when `compress` is set),
//! reopens a fresh live file, and prunes everything past `backup_count`,
//! most recent first. Files whose names the sink did not produce are never
//! touched.
//!
//! Backup names: `app.log.1`, `app.log.2024-01-31.1`,
//! `app.log.2024-01-31.2.gz`; with `keep_extension`, `app.2024-01-31.1.log`.
//!
//! ## Durability
//!
//! `sync_threshold_bytes` and `sync_interval_ms` bound how much
//! acknowledged data a crash can cost. Due flushes run out-of-band: a
//! failed one is logged and counted in [`SinkStats`], never surfaced as a
//! write error, and stays owed until a flush succeeds. Both checks run
//! lazily at write time, so an idle sink does not flush on a timer.
//! [`RollingSink::close`] always flushes once more.
//!
//! ## Cross-process use
//!
//! `use_lock` serializes the roll cascade between cooperating processes
//! through a `.lock` file next to the live file. Appends themselves are
//! not serialized; give each process its own file unless the host
//! coordinates writers itself.
//!
//! ## Example
//!
//! ```no_run
//! use rollsink::{RollingSink, RotationConfig};
//!
//! # async fn demo() -> rollsink::Result<()> {
//! let config = RotationConfig {
//!     max_size_bytes: 10 * 1024 * 1024,
//!     backup_count: 5,
//!     compress: true,
//!     ..Default::default()
//! };
//! let mut sink = RollingSink::open("logs/app.log", config).await?;
//! sink.write(b"hello\n").await?;
//! sink.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod date;
pub mod error;
pub mod lock;
pub mod sink;

mod disk;
mod durability;
mod namer;
mod policy;
mod retention;

pub use clock::{Clock, MockClock, SystemClock};
pub use config::{OpenMode, RotationConfig};
pub use date::{DatePattern, StrftimePattern};
pub use error::{Error, Result};
pub use lock::{FileLockCoordinator, LockCoordinator, LockGuard};
pub use sink::{RollingSink, SinkStats};
