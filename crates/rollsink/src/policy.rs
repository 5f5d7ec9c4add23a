//! Rotation Triggers
//!
//! The policy decides, before each block is appended, whether the live file
//! must roll first. Evaluation is pure: it reads the sink's in-memory size
//! accounting and the injected clock, never the filesystem, and it runs
//! outside the advisory lock.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::date::DatePattern;

/// Why a roll fired. A date-triggered roll carries the new bucket label;
/// the sink adopts it once the roll completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RollTrigger {
    Size,
    Date { bucket: String },
}

/// When writes roll the live file.
pub(crate) enum RotationPolicy {
    /// Roll on size alone.
    SizeTriggered { max_size: u64 },
    /// A bucket change rolls unconditionally; otherwise fall back to size.
    /// A size-only roll under this policy files its backup under the
    /// current bucket, not a new one.
    DateThenSize {
        max_size: u64,
        pattern: Arc<dyn DatePattern>,
    },
}

impl RotationPolicy {
    /// Decide whether appending `incoming` bytes must roll the file first.
    ///
    /// The size rule never fires on an empty live file, so a block larger
    /// than the limit lands whole and rolls out on the next write.
    pub(crate) fn evaluate(
        &self,
        current_size: u64,
        incoming: u64,
        current_bucket: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<RollTrigger> {
        match self {
            RotationPolicy::SizeTriggered { max_size } => {
                size_due(*max_size, current_size, incoming).then_some(RollTrigger::Size)
            }
            RotationPolicy::DateThenSize { max_size, pattern } => {
                let bucket = pattern.format(now);
                if current_bucket != Some(bucket.as_str()) {
                    return Some(RollTrigger::Date { bucket });
                }
                size_due(*max_size, current_size, incoming).then_some(RollTrigger::Size)
            }
        }
    }

    /// Bucket label for a freshly opened sink; `None` under pure size.
    pub(crate) fn initial_bucket(&self, now: DateTime<Utc>) -> Option<String> {
        match self {
            RotationPolicy::SizeTriggered { .. } => None,
            RotationPolicy::DateThenSize { pattern, .. } => Some(pattern.format(now)),
        }
    }

    pub(crate) fn date_pattern(&self) -> Option<&dyn DatePattern> {
        match self {
            RotationPolicy::SizeTriggered { .. } => None,
            RotationPolicy::DateThenSize { pattern, .. } => Some(pattern.as_ref()),
        }
    }
}

fn size_due(max_size: u64, current_size: u64, incoming: u64) -> bool {
    max_size > 0
        && current_size > 0
        && incoming > 0
        && (incoming > max_size || current_size.saturating_add(incoming) > max_size)
}
