//! Atomic artifact publication and temp-file hygiene.
//!
//! Every artifact is written to a `.tmp` sibling in its destination
//! directory, flushed and synced to durable storage, then renamed over the
//! final name. Readers observe either the complete previous generation or
//! the complete new one. A cancelled run can leave `.tmp` files behind;
//! `sweep_temp_files` reclaims them on the next startup.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::constants::TMP_SUFFIX;
use crate::error::{IndexError, Result};

/// The `.tmp` sibling of a destination path.
pub fn tmp_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(TMP_SUFFIX);
    dest.with_file_name(name)
}

/// Open a buffered writer on the `.tmp` sibling of `dest`.
pub fn create_tmp(dest: &Path) -> Result<(BufWriter<File>, PathBuf)> {
    let tmp = tmp_path(dest);
    let file = File::create(&tmp).map_err(|e| IndexError::io(&tmp, "create", e))?;
    Ok((BufWriter::new(file), tmp))
}

/// Flush and sync a temp file to durable storage, closing it.
pub fn finish_tmp(mut writer: BufWriter<File>, tmp: &Path) -> Result<()> {
    writer
        .flush()
        .map_err(|e| IndexError::io(tmp, "flush", e))?;
    let file = writer
        .into_inner()
        .map_err(|e| IndexError::io(tmp, "flush", e.into_error()))?;
    file.sync_all()
        .map_err(|e| IndexError::io(tmp, "sync", e))?;
    Ok(())
}

/// Rename a finished temp file over its final name.
pub fn rename_into_place(tmp: &Path, dest: &Path) -> Result<()> {
    fs::rename(tmp, dest).map_err(|e| IndexError::io(dest, "rename", e))
}

/// Flush, sync, and rename a temp file over its final name. Artifacts that
/// publish as a set should use `finish_tmp` for each file first and rename
/// only once every temp is durable.
pub fn publish(writer: BufWriter<File>, tmp: &Path, dest: &Path) -> Result<()> {
    finish_tmp(writer, tmp)?;
    rename_into_place(tmp, dest)
}

/// Remove stale `*.tmp` files directly under `dir`. Missing directories are
/// fine. Returns the number of files removed.
pub fn sweep_temp_files(dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let entries = fs::read_dir(dir).map_err(|e| IndexError::io(dir, "read dir", e))?;
    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| IndexError::io(dir, "read dir", e))?;
        let path = entry.path();
        let is_tmp = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(TMP_SUFFIX));
        if is_tmp && path.is_file() {
            fs::remove_file(&path).map_err(|e| IndexError::io(&path, "remove", e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Remove a working directory and everything under it, if present.
pub fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| IndexError::io(dir, "remove dir", e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_publish_replaces_destination_atomically() -> Result<()> {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("data.bin");
        fs::write(&dest, b"old generation").unwrap();

        let (mut writer, tmp) = create_tmp(&dest)?;
        writer.write_all(b"new generation").unwrap();
        // destination untouched until publish
        assert_eq!(fs::read(&dest).unwrap(), b"old generation");

        publish(writer, &tmp, &dest)?;
        assert_eq!(fs::read(&dest).unwrap(), b"new generation");
        assert!(!tmp.exists());
        Ok(())
    }

    #[test]
    fn test_sweep_removes_only_temp_files() -> Result<()> {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("lexicon.bin"), b"keep").unwrap();
        fs::write(dir.path().join("lexicon.bin.tmp"), b"stale").unwrap();
        fs::write(dir.path().join("postings_index.bin.tmp"), b"stale").unwrap();

        let removed = sweep_temp_files(dir.path())?;
        assert_eq!(removed, 2);
        assert!(dir.path().join("lexicon.bin").exists());
        assert!(!dir.path().join("lexicon.bin.tmp").exists());
        Ok(())
    }

    #[test]
    fn test_sweep_missing_dir_is_noop() {
        assert_eq!(sweep_temp_files(Path::new("/no/such/dir")).unwrap(), 0);
    }
}
