//! Flush Scheduling
//!
//! Writes feed the controller; when the byte or time debt crosses its
//! threshold the sink issues an `fdatasync` out-of-band. Debt clears only
//! on a successful flush, so a failed one stays owed and the next write
//! retries it.

use std::time::Duration;

use chrono::{DateTime, Utc};

pub(crate) struct DurabilityController {
    threshold_bytes: u64,
    interval_ms: i64,
    pending_bytes: u64,
    last_sync: DateTime<Utc>,
}

impl DurabilityController {
    pub(crate) fn new(threshold_bytes: u64, interval: Duration, now: DateTime<Utc>) -> Self {
        Self {
            threshold_bytes,
            interval_ms: interval.as_millis().min(i64::MAX as u128) as i64,
            pending_bytes: 0,
            last_sync: now,
        }
    }

    /// Account for `written` bytes; true when a flush is due.
    pub(crate) fn record(&mut self, written: u64, now: DateTime<Utc>) -> bool {
        self.pending_bytes = self.pending_bytes.saturating_add(written);
        let by_bytes = self.threshold_bytes > 0 && self.pending_bytes >= self.threshold_bytes;
        let by_time = self.interval_ms > 0
            && now.signed_duration_since(self.last_sync).num_milliseconds() >= self.interval_ms;
        by_bytes || by_time
    }

    /// Clear the debt after a successful flush.
    pub(crate) fn mark_synced(&mut self, now: DateTime<Utc>) {
        self.pending_bytes = 0;
        self.last_sync = now;
    }
}
