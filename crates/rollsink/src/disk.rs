//! Disk Collaborators
//!
//! Every filesystem touch the sink performs goes through one of these
//! helpers, so the rotation logic stays a readable sequence of intents:
//! probe, move-into-slot, reopen, list, remove.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

/// Expand `~` or a `~/` prefix to the user's home directory. Anything else,
/// including non-unicode paths, passes through untouched.
pub(crate) fn expand_tilde(path: &Path) -> PathBuf {
    let Some(text) = path.to_str() else {
        return path.to_path_buf();
    };
    if text == "~" {
        return dirs::home_dir().unwrap_or_else(|| path.to_path_buf());
    }
    if let Some(rest) = text.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

/// Create the parent directory chain for `path`.
pub(crate) async fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}

/// Size of the file at `path`; `None` when it does not exist.
pub(crate) async fn file_size(path: &Path) -> io::Result<Option<u64>> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta.len())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Open the live file, creating it with `file_mode` when absent.
pub(crate) async fn open_live(path: &Path, truncate: bool, file_mode: u32) -> io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.create(true).write(true);
    if truncate {
        options.truncate(true);
    } else {
        options.append(true);
    }
    #[cfg(unix)]
    options.mode(file_mode);
    #[cfg(not(unix))]
    let _ = file_mode;
    options.open(path).await
}

/// Move `src` into the backup slot at `dst`, gzipping when `compress` is
/// set. Returns false when there was nothing to move. An occupied
/// destination is overwritten: the rotation wins over whatever held the
/// slot. A plain `src` always takes priority; under `compress`, when only
/// `"{src}.gz"` exists (an earlier roll's output being shifted along the
/// chain) it is renamed, not re-encoded. A `.gz` neighbor of a plain file
/// that is still present belongs to someone else and is left alone.
pub(crate) async fn move_into_slot(src: &Path, dst: &Path, compress: bool) -> io::Result<bool> {
    match fs::metadata(src).await {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // No plain source: under compression the slot may instead hold
            // an earlier roll's `.gz` output, shifted along by rename.
            if compress {
                let src_gz = with_gz(src);
                if fs::metadata(&src_gz).await.is_ok() {
                    rename_overwriting(&src_gz, &with_gz(dst)).await?;
                    return Ok(true);
                }
            }
            return Ok(false);
        }
        Err(err) => return Err(err),
    }
    if compress {
        compress_into(src, &with_gz(dst)).await?;
        fs::remove_file(src).await?;
    } else {
        rename_overwriting(src, dst).await?;
    }
    Ok(true)
}

/// Remove a file, treating "already gone" as success.
pub(crate) async fn remove_file_quiet(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Plain file names in `dir`, one level deep.
pub(crate) async fn list_file_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    Ok(names)
}

fn with_gz(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}

/// Rename with overwrite semantics even where the platform refuses to
/// clobber an existing destination.
async fn rename_overwriting(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(err) => {
            if fs::metadata(dst).await.is_ok() {
                fs::remove_file(dst).await?;
                fs::rename(src, dst).await
            } else {
                Err(err)
            }
        }
    }
}

/// Gzip `src` into `dst` on the blocking pool.
async fn compress_into(src: &Path, dst: &Path) -> io::Result<()> {
    let src = src.to_path_buf();
    let dst = dst.to_path_buf();
    tokio::task::spawn_blocking(move || -> io::Result<()> {
        let mut input = std::fs::File::open(&src)?;
        let output = std::fs::File::create(&dst)?;
        let mut encoder = flate2::write::GzEncoder::new(output, flate2::Compression::default());
        std::io::copy(&mut input, &mut encoder)?;
        encoder.finish()?;
        Ok(())
    })
    .await
    .map_err(io::Error::other)?
}
