//! Storage operations
//!
//! Filesystem work behind LIST, NLST, DELE, MKD, RMD, RNFR/RNTO and SIZE.
//! Callers pass paths already checked by the [`PathResolver`](super::PathResolver).

use chrono::{DateTime, Local};
use log::{debug, info};
use std::fs::Metadata;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tokio::fs;

use crate::error::{CommandError, PathError};
use crate::storage::validation::{ResolvedPath, file_name};

/// Six months, the cut-over between "time" and "year" columns in `ls -l`.
const RECENT_WINDOW: Duration = Duration::from_secs(180 * 24 * 60 * 60);

/// Metadata needed to render one listing line.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub name: String,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub mode: u32,
}

impl EntryInfo {
    fn from_metadata(name: String, meta: &Metadata, is_symlink: bool) -> Self {
        Self {
            name,
            is_dir: meta.is_dir(),
            is_symlink,
            size: if meta.is_dir() { 0 } else { meta.len() },
            modified: meta.modified().ok(),
            mode: mode_bits(meta),
        }
    }
}

#[cfg(unix)]
fn mode_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn mode_bits(meta: &Metadata) -> u32 {
    match (meta.is_dir(), meta.permissions().readonly()) {
        (true, _) => 0o755,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}

/// Strips `ls`-style options (`-la`, `-a`) some clients prepend to LIST/NLST arguments.
pub fn strip_list_options(arg: Option<&str>) -> Option<&str> {
    let mut rest = arg?.trim_start();
    while rest.starts_with('-') {
        rest = match rest.split_once(' ') {
            Some((_, tail)) => tail.trim_start(),
            None => "",
        };
    }
    if rest.is_empty() { None } else { Some(rest) }
}

/// Lists a directory, or the single entry when `resolved` is a file.
///
/// Entries are sorted by name. Entries whose metadata cannot be read are skipped.
/// Symlinks are only followed when their target stays inside `root`.
pub async fn list_directory(
    resolved: &ResolvedPath,
    root: &Path,
) -> Result<Vec<EntryInfo>, CommandError> {
    let meta = fs::metadata(&resolved.real_path)
        .await
        .map_err(|e| fs_error(&resolved.virtual_path, e))?;

    if !meta.is_dir() {
        let name = file_name(&resolved.virtual_path).to_string();
        return Ok(vec![EntryInfo::from_metadata(name, &meta, false)]);
    }

    let mut entries = Vec::new();
    let mut dir = fs::read_dir(&resolved.real_path)
        .await
        .map_err(|e| fs_error(&resolved.virtual_path, e))?;

    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|e| fs_error(&resolved.virtual_path, e))?
    {
        let name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path();
        let link_meta = match fs::symlink_metadata(&path).await {
            Ok(m) => m,
            Err(e) => {
                debug!("Skipping unreadable entry {name}: {e}");
                continue;
            }
        };
        let is_symlink = link_meta.file_type().is_symlink();
        let meta = if is_symlink {
            followed_metadata(&path, root).await.unwrap_or(link_meta)
        } else {
            link_meta
        };
        entries.push(EntryInfo::from_metadata(name, &meta, is_symlink));
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    info!(
        "Listed directory {} (real: {}) - {} entries",
        resolved.virtual_path,
        resolved.real_path.display(),
        entries.len()
    );
    Ok(entries)
}

/// Metadata of a symlink's target, or `None` when it is dangling or outside `root`.
async fn followed_metadata(link: &Path, root: &Path) -> Option<Metadata> {
    let target = fs::canonicalize(link).await.ok()?;
    if !target.starts_with(root) {
        debug!("Not following {} outside the root", link.display());
        return None;
    }
    fs::metadata(&target).await.ok()
}

/// Renders entries as `ls -l` lines, CRLF-terminated.
pub fn format_long(entries: &[EntryInfo], now: SystemTime) -> String {
    entries
        .iter()
        .map(|e| format!("{}\r\n", format_long_line(e, now)))
        .collect()
}

/// Renders bare names, CRLF-terminated (NLST).
pub fn format_names(entries: &[EntryInfo]) -> String {
    entries.iter().map(|e| format!("{}\r\n", e.name)).collect()
}

fn format_long_line(entry: &EntryInfo, now: SystemTime) -> String {
    let kind = if entry.is_symlink {
        'l'
    } else if entry.is_dir {
        'd'
    } else {
        '-'
    };
    format!(
        "{}{} {:>3} {:<8} {:<8} {:>8} {} {}",
        kind,
        permission_string(entry.mode),
        1,
        "owner",
        "group",
        entry.size,
        format_mtime(entry.modified, now),
        entry.name
    )
}

fn permission_string(mode: u32) -> String {
    const FLAGS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];
    FLAGS
        .iter()
        .map(|&(bit, c)| if mode & bit != 0 { c } else { '-' })
        .collect()
}

fn format_mtime(modified: Option<SystemTime>, now: SystemTime) -> String {
    let modified = modified.unwrap_or(SystemTime::UNIX_EPOCH);
    let local: DateTime<Local> = modified.into();
    let recent = match now.duration_since(modified) {
        Ok(age) => age < RECENT_WINDOW,
        // Timestamps in the future render with the year, like ls.
        Err(_) => false,
    };
    if recent {
        local.format("%b %d %H:%M").to_string()
    } else {
        local.format("%b %d  %Y").to_string()
    }
}

/// Size in bytes of a regular file.
pub async fn file_size(resolved: &ResolvedPath) -> Result<u64, CommandError> {
    let meta = fs::metadata(&resolved.real_path)
        .await
        .map_err(|e| fs_error(&resolved.virtual_path, e))?;
    if !meta.is_file() {
        return Err(PathError::NotAFile(resolved.virtual_path.clone()).into());
    }
    Ok(meta.len())
}

/// Deletes a file. Directories are refused; symlinks are removed, not followed.
pub async fn delete_file(resolved: &ResolvedPath) -> Result<(), CommandError> {
    let meta = fs::symlink_metadata(&resolved.real_path)
        .await
        .map_err(|e| fs_error(&resolved.virtual_path, e))?;
    if meta.is_dir() {
        return Err(PathError::NotAFile(resolved.virtual_path.clone()).into());
    }
    fs::remove_file(&resolved.real_path)
        .await
        .map_err(|e| fs_error(&resolved.virtual_path, e))?;
    info!(
        "Deleted file {} (real: {})",
        resolved.virtual_path,
        resolved.real_path.display()
    );
    Ok(())
}

/// Creates one directory; the parent must exist.
pub async fn make_directory(resolved: &ResolvedPath) -> Result<(), CommandError> {
    fs::create_dir(&resolved.real_path)
        .await
        .map_err(|e| fs_error(&resolved.virtual_path, e))?;
    info!(
        "Created directory {} (real: {})",
        resolved.virtual_path,
        resolved.real_path.display()
    );
    Ok(())
}

/// Removes an empty directory.
pub async fn remove_directory(resolved: &ResolvedPath) -> Result<(), CommandError> {
    let meta = fs::symlink_metadata(&resolved.real_path)
        .await
        .map_err(|e| fs_error(&resolved.virtual_path, e))?;
    if !meta.is_dir() {
        return Err(PathError::NotADirectory(resolved.virtual_path.clone()).into());
    }
    fs::remove_dir(&resolved.real_path)
        .await
        .map_err(|e| fs_error(&resolved.virtual_path, e))?;
    info!(
        "Removed directory {} (real: {})",
        resolved.virtual_path,
        resolved.real_path.display()
    );
    Ok(())
}

/// Renames `from` to `to`; both already resolved inside the root.
pub async fn rename(from: &ResolvedPath, to: &ResolvedPath) -> Result<(), CommandError> {
    fs::symlink_metadata(&from.real_path)
        .await
        .map_err(|e| fs_error(&from.virtual_path, e))?;
    fs::rename(&from.real_path, &to.real_path)
        .await
        .map_err(|e| fs_error(&to.virtual_path, e))?;
    info!("Renamed {} -> {}", from.virtual_path, to.virtual_path);
    Ok(())
}

fn fs_error(virtual_path: &str, source: io::Error) -> CommandError {
    if source.kind() == io::ErrorKind::NotFound {
        PathError::NotFound(virtual_path.to_string()).into()
    } else {
        CommandError::FileSystem {
            path: virtual_path.to_string(),
            source,
        }
    }
}
