//! Atomic file writes
//!
//! Every file readsync owns (notes, token, watermark) is written to a temp
//! file in the same directory and renamed over the target, so a crash never
//! leaves a partially-written file behind.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Write `data` to `path` atomically, creating parent directories
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    write_via_temp(path, data, |temp_path| File::create(temp_path))
}

/// Like [`atomic_write`], but only the owner can read the result
///
/// On unix the temp file is 0600 before any data reaches it, so the secret
/// is never readable by others, not even briefly.
pub(crate) fn atomic_write_private(path: &Path, data: &[u8]) -> io::Result<()> {
    write_via_temp(path, data, open_private)
}

fn write_via_temp(
    path: &Path,
    data: &[u8],
    open: impl FnOnce(&Path) -> io::Result<File>,
) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_path_for(path);

    let result = (|| {
        let mut file = open(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies to new files; a leftover temp keeps its old bits
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<File> {
    File::create(path)
}

/// Temp file next to the target (same filesystem, so rename is atomic)
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
