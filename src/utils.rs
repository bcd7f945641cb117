//! Filesystem helpers shared by the journal segments.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Open `path` for appending, creating it if it does not exist.
pub(crate) fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Sync the directory containing `path` so that file creation and deletion
/// inside it survive a power loss.
#[cfg(unix)]
pub(crate) fn sync_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => File::open(dir)?.sync_all(),
        _ => File::open(".")?.sync_all(),
    }
}

/// Directory handles cannot be synced portably outside unix; the file
/// contents themselves are still synced on every append.
#[cfg(not(unix))]
pub(crate) fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
