use std::fs;
use std::io;
use std::path::Path;

use crate::error::{PluginError, Result};

/// Remove whatever lives at `path`: file, symlink or directory tree.
///
/// Symlinks are removed themselves, never followed. A missing path is not an error.
pub fn remove_all(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(PluginError::io(path, err)),
    };

    let file_type = metadata.file_type();
    let result = if file_type.is_dir() {
        fs::remove_dir_all(path)
    } else if file_type.is_symlink() {
        remove_symlink(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|err| PluginError::io(path, err))
}

pub fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|err| PluginError::io(path, err))
}

/// Recursively copy `src` into `dest`, creating `dest` if needed.
///
/// Regular files are copied by content, directories are recreated, and
/// symlinks are recreated with their original link text. Permission bits of
/// files and directories follow the source.
pub fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    create_dir_all(dest)?;

    let entries = fs::read_dir(src).map_err(|err| PluginError::io(src, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| PluginError::io(src, err))?;
        let source_path = entry.path();
        let dest_path = dest.join(entry.file_name());
        let metadata =
            fs::symlink_metadata(&source_path).map_err(|err| PluginError::io(&source_path, err))?;
        let file_type = metadata.file_type();

        if file_type.is_symlink() {
            copy_symlink(&source_path, &dest_path)?;
            continue;
        }

        if file_type.is_dir() {
            copy_dir(&source_path, &dest_path)?;
        } else {
            fs::copy(&source_path, &dest_path).map_err(|err| PluginError::io(&dest_path, err))?;
        }

        fs::set_permissions(&dest_path, metadata.permissions())
            .map_err(|err| PluginError::io(&dest_path, err))?;
    }

    let metadata = fs::metadata(src).map_err(|err| PluginError::io(src, err))?;
    fs::set_permissions(dest, metadata.permissions()).map_err(|err| PluginError::io(dest, err))
}

fn copy_symlink(source: &Path, dest: &Path) -> Result<()> {
    let link = fs::read_link(source).map_err(|err| PluginError::io(source, err))?;
    let is_dir = fs::metadata(source).map(|m| m.is_dir()).unwrap_or(false);
    symlink(&link, dest, is_dir).map_err(|err| PluginError::io(dest, err))
}

/// Point `dst` at `src`, replacing anything already at `dst`.
pub fn safe_symlink(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        create_dir_all(parent)?;
    }
    remove_all(dst)?;
    symlink(src, dst, src.is_dir()).map_err(|err| PluginError::io(dst, err))
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path, _is_dir: bool) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn symlink(original: &Path, link: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        std::os::windows::fs::symlink_dir(original, link)
    } else {
        std::os::windows::fs::symlink_file(original, link)
    }
}

#[cfg(unix)]
fn remove_symlink(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

// Directory symlinks on Windows are removed like directories.
#[cfg(windows)]
fn remove_symlink(path: &Path) -> io::Result<()> {
    fs::remove_file(path).or_else(|_| fs::remove_dir(path))
}
