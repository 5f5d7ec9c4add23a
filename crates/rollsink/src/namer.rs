//! Backup Names
//!
//! One namer is compiled per sink. Rendering produces the two layouts the
//! sink supports; parsing is the inverse over directory entries, tolerant
//! of a trailing `.gz` and blind to names this sink would not have
//! produced. Blind matters: retention deletes files, and it must never
//! consider a neighbor that merely shares a prefix.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::date::DatePattern;
use crate::error::{Error, Result};

/// Identity of a backup file, parsed from or rendered into its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BackupId {
    /// Date-bucket label; present exactly when the sink has a date pattern.
    pub bucket: Option<String>,
    /// Slot index. 1 is the most recently rolled file within its bucket.
    pub index: u32,
}

/// Renders and parses backup names for one live path.
pub(crate) struct BackupNamer {
    dir: PathBuf,
    stem: String,
    ext: String,
    separator: String,
    keep_extension: bool,
    dated: bool,
    matcher: Regex,
}

impl BackupNamer {
    pub(crate) fn new(
        live_path: &Path,
        separator: &str,
        keep_extension: bool,
        pattern: Option<&dyn DatePattern>,
    ) -> Result<Self> {
        let dir = match live_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let (stem, ext) = split_name(live_path);
        let fragment = pattern.map(|p| p.regex_fragment());
        let matcher = build_matcher(&stem, &ext, separator, keep_extension, fragment)?;

        Ok(Self {
            dir,
            stem,
            ext,
            separator: separator.to_string(),
            keep_extension,
            dated: fragment.is_some(),
            matcher,
        })
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for the backup in slot `index` under `bucket`. The `.gz`
    /// suffix for compressed backups is the mover's business, not the
    /// namer's.
    pub(crate) fn render(&self, bucket: Option<&str>, index: u32) -> String {
        let mut name = String::with_capacity(self.stem.len() + self.ext.len() + 16);
        name.push_str(&self.stem);
        if !self.keep_extension {
            name.push_str(&self.ext);
        }
        if let Some(bucket) = bucket {
            name.push_str(&self.separator);
            name.push_str(bucket);
        }
        name.push_str(&self.separator);
        name.push_str(&index.to_string());
        if self.keep_extension {
            name.push_str(&self.ext);
        }
        name
    }

    pub(crate) fn path_for(&self, bucket: Option<&str>, index: u32) -> PathBuf {
        self.dir.join(self.render(bucket, index))
    }

    /// Parse a directory entry back into a backup identity. `None` for
    /// anything this namer did not produce, including the live file.
    pub(crate) fn parse(&self, file_name: &str) -> Option<BackupId> {
        let caps = self.matcher.captures(file_name)?;
        if self.dated {
            let bucket = caps.get(1)?.as_str().to_string();
            let index = caps.get(2)?.as_str().parse().ok()?;
            Some(BackupId {
                bucket: Some(bucket),
                index,
            })
        } else {
            let index = caps.get(1)?.as_str().parse().ok()?;
            Some(BackupId {
                bucket: None,
                index,
            })
        }
    }
}

/// Split a file name at its last dot. A dot in position zero is a hidden
/// file, not an extension.
fn split_name(path: &Path) -> (String, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.rfind('.') {
        Some(pos) if pos > 0 => (name[..pos].to_string(), name[pos..].to_string()),
        _ => (name, String::new()),
    }
}

fn build_matcher(
    stem: &str,
    ext: &str,
    separator: &str,
    keep_extension: bool,
    date_fragment: Option<&str>,
) -> Result<Regex> {
    let stem = regex::escape(stem);
    let ext = regex::escape(ext);
    let sep = regex::escape(separator);
    let bucket = date_fragment
        .map(|fragment| format!("{sep}({fragment})"))
        .unwrap_or_default();
    let pattern = if keep_extension {
        format!("^{stem}{bucket}{sep}(\\d+){ext}(?:\\.gz)?$")
    } else {
        format!("^{stem}{ext}{bucket}{sep}(\\d+)(?:\\.gz)?$")
    };
    Regex::new(&pattern).map_err(|e| Error::Config(format!("backup name matcher: {e}")))
}
