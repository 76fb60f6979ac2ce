//! File helpers shared by the provisioners
//!
//! Writes go to a temp file in the target directory and are renamed into
//! place, so a failed write never leaves a truncated file behind.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

/// Permission bits of `path`, or `None` if it does not exist
pub fn mode_of(path: &Path) -> Result<Option<u32>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.permissions().mode() & 0o7777)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to stat {}", path.display())),
    }
}

/// Whether `path` exists; permission errors are reported, not treated as absent
pub fn exists(path: &Path) -> Result<bool> {
    path.try_exists()
        .with_context(|| format!("Failed to check {}", path.display()))
}

pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("Failed to chmod {:o} {}", mode, path.display()))
}

/// Read a file, `None` if it does not exist
pub fn read_if_exists(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Create a directory with `mode` if absent. Returns whether it was created.
pub fn ensure_dir(path: &Path, mode: u32) -> Result<bool> {
    if exists(path)? {
        return Ok(false);
    }
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    set_mode(path, mode)?;
    Ok(true)
}

/// Atomically replace `path` with `contents` and `mode`
pub fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let tmp = temp_path(path);
    let result = write_then_rename(&tmp, path, contents, mode);
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Write only when content or mode differ. Returns whether anything changed.
pub fn write_if_changed(path: &Path, contents: &str, mode: u32) -> Result<bool> {
    if read_if_exists(path)?.as_deref() == Some(contents) {
        if mode_of(path)? == Some(mode) {
            return Ok(false);
        }
        set_mode(path, mode)?;
        return Ok(true);
    }
    write_atomic(path, contents.as_bytes(), mode)?;
    Ok(true)
}

fn write_then_rename(tmp: &Path, path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(tmp)
        .with_context(|| format!("Failed to create {}", tmp.display()))?;
    file.write_all(contents)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    file.sync_all()?;
    drop(file);

    // umask may have narrowed the create mode
    set_mode(tmp, mode)?;
    fs::rename(tmp, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_sets_mode() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("secret");
        write_atomic(&path, b"hunter2", 0o400).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hunter2");
        assert_eq!(mode_of(&path).unwrap(), Some(0o400));
        assert!(!tmp.path().join(".secret.tmp").exists());
    }

    #[test]
    fn test_write_atomic_replaces_read_only_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("grant");
        write_atomic(&path, b"one", 0o440).unwrap();
        write_atomic(&path, b"two", 0o440).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
    }

    #[test]
    fn test_write_atomic_missing_parent_leaves_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing").join("file");
        assert!(write_atomic(&path, b"x", 0o644).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_write_if_changed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("unit");
        assert!(write_if_changed(&path, "a\n", 0o644).unwrap());
        assert!(!write_if_changed(&path, "a\n", 0o644).unwrap());
        assert!(write_if_changed(&path, "b\n", 0o644).unwrap());

        set_mode(&path, 0o666).unwrap();
        assert!(write_if_changed(&path, "b\n", 0o644).unwrap());
        assert_eq!(mode_of(&path).unwrap(), Some(0o644));
    }

    #[test]
    fn test_ensure_dir() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("facts.d");
        assert!(ensure_dir(&dir, 0o755).unwrap());
        assert!(!ensure_dir(&dir, 0o755).unwrap());
        assert_eq!(mode_of(&dir).unwrap(), Some(0o755));
    }

    #[test]
    fn test_mode_of_missing() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(mode_of(&tmp.path().join("nope")).unwrap(), None);
        assert_eq!(read_if_exists(&tmp.path().join("nope")).unwrap(), None);
    }
}
