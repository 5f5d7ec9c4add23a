//! Date Buckets
//!
//! A [`DatePattern`] turns the clock into the bucket label stamped into
//! backup names, a regex fragment the name parser embeds so labels can be
//! recognized again, and a chronological key retention orders by.
//!
//! [`StrftimePattern`] implements the subset of strftime that stays
//! unambiguous inside a file name: every supported field is zero-padded and
//! fixed-width, so the matching fragment is exact rather than greedy.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{Error, Result};

/// A compiled date pattern: rendering, matching, ordering.
pub trait DatePattern: Send + Sync {
    /// Render `now` into a bucket label, e.g. `2024-01-31`.
    fn format(&self, now: DateTime<Utc>) -> String;

    /// Regex fragment matching exactly the labels [`format`](Self::format)
    /// produces. Must not contain capture groups.
    fn regex_fragment(&self) -> &str;

    /// Chronological key for a label. `None` when the label does not carry
    /// a full calendar date; callers then fall back to comparing labels as
    /// text, which orders correctly for zero-padded fields.
    fn order_key(&self, bucket: &str) -> Option<NaiveDateTime>;
}

/// strftime-style pattern over a fixed specifier set.
///
/// Supported: `%Y %y %m %d %H %M %S %j %F` and `%%`. Anything else is
/// rejected at construction.
#[derive(Debug, Clone)]
pub struct StrftimePattern {
    pattern: String,
    fragment: String,
}

impl StrftimePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let fragment = build_fragment(pattern)?;
        Ok(Self {
            pattern: pattern.to_string(),
            fragment,
        })
    }
}

impl DatePattern for StrftimePattern {
    fn format(&self, now: DateTime<Utc>) -> String {
        now.format(&self.pattern).to_string()
    }

    fn regex_fragment(&self) -> &str {
        &self.fragment
    }

    fn order_key(&self, bucket: &str) -> Option<NaiveDateTime> {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(bucket, &self.pattern) {
            return Some(datetime);
        }
        // Patterns with a date but not a complete time (e.g. "%Y-%m-%d" or
        // "%Y-%m-%d-%H") still order by day; the textual fallback breaks
        // same-day ties.
        NaiveDate::parse_from_str(bucket, &self.pattern)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    }
}

fn build_fragment(pattern: &str) -> Result<String> {
    let mut fragment = String::new();
    let mut literal = String::new();
    let mut chars = pattern.chars();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            literal.push(ch);
            continue;
        }
        let Some(spec) = chars.next() else {
            return Err(Error::DatePattern {
                pattern: pattern.to_string(),
                reason: "trailing '%'".to_string(),
            });
        };
        if spec == '%' {
            literal.push('%');
            continue;
        }
        if !literal.is_empty() {
            fragment.push_str(&regex::escape(&literal));
            literal.clear();
        }
        fragment.push_str(match spec {
            'Y' => r"\d{4}",
            'y' | 'm' | 'd' | 'H' | 'M' | 'S' => r"\d{2}",
            'j' => r"\d{3}",
            'F' => r"\d{4}-\d{2}-\d{2}",
            other => {
                return Err(Error::DatePattern {
                    pattern: pattern.to_string(),
                    reason: format!("unsupported specifier '%{other}'"),
                })
            }
        });
    }
    if !literal.is_empty() {
        fragment.push_str(&regex::escape(&literal));
    }
    Ok(fragment)
}
