//! Retention
//!
//! Decides which backups survive a roll. Pure selection over parsed names;
//! the sink does the deleting (best-effort) afterwards.
//!
//! Ordering is most-recent-first: newer date bucket strictly before older,
//! then lower index before higher within a bucket. The first `keep` entries
//! survive; the rest are expired. Position in that ordering is all that
//! matters, so a stale high-index file from an old bucket can never outlive
//! a newer backup.

use std::cmp::Ordering;
use std::path::PathBuf;

use crate::date::DatePattern;
use crate::namer::BackupId;

/// Paths to delete so only the `keep` most recent backups remain.
pub(crate) fn select_expired(
    mut backups: Vec<(BackupId, PathBuf)>,
    keep: usize,
    pattern: Option<&dyn DatePattern>,
) -> Vec<PathBuf> {
    backups.sort_by(|a, b| recency(&a.0, &b.0, pattern));
    let keep = keep.min(backups.len());
    backups
        .split_off(keep)
        .into_iter()
        .map(|(_, path)| path)
        .collect()
}

/// `Less` when `a` is more recent than `b`.
fn recency(a: &BackupId, b: &BackupId, pattern: Option<&dyn DatePattern>) -> Ordering {
    bucket_recency(a.bucket.as_deref(), b.bucket.as_deref(), pattern)
        .then_with(|| a.index.cmp(&b.index))
}

fn bucket_recency(
    a: Option<&str>,
    b: Option<&str>,
    pattern: Option<&dyn DatePattern>,
) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        // Mixed sets do not occur under one namer; order dated first so the
        // result is still deterministic if one ever shows up.
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let key_a = pattern.and_then(|p| p.order_key(a));
            let key_b = pattern.and_then(|p| p.order_key(b));
            match (key_a, key_b) {
                // Newer key first; zero-padded labels break same-key ties
                // (e.g. hourly buckets whose pattern only dates to the day).
                (Some(key_a), Some(key_b)) => key_b.cmp(&key_a).then_with(|| b.cmp(a)),
                _ => b.cmp(a),
            }
        }
    }
}
