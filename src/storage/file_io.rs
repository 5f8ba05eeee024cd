//! File I/O utilities with atomic writes
//!
//! Every data file, the settings file and the commit journal are written
//! through [`write_json_atomic`], so a reader never sees a half-written file.
//! The journal relies on the rename being durable before the data files are
//! touched, hence the directory sync after each rename.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::EnvelopeError;

/// Where [`write_json_atomic`] stages the new contents of `path`
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

/// Read JSON from a file, returning a default value if file doesn't exist
pub fn read_json<T, P>(path: P) -> Result<T, EnvelopeError>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    match open(path.as_ref())? {
        Some(reader) => parse(path.as_ref(), reader),
        None => Ok(T::default()),
    }
}

/// Read JSON from a file that must exist
pub fn read_json_required<T, P>(path: P) -> Result<T, EnvelopeError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let reader = open(path)?
        .ok_or_else(|| EnvelopeError::Storage(format!("File not found: {}", path.display())))?;
    parse(path, reader)
}

fn open(path: &Path) -> Result<Option<BufReader<File>>, EnvelopeError> {
    match File::open(path) {
        Ok(file) => Ok(Some(BufReader::new(file))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(EnvelopeError::Storage(format!(
            "Failed to open {}: {}",
            path.display(),
            e
        ))),
    }
}

fn parse<T: DeserializeOwned>(path: &Path, reader: BufReader<File>) -> Result<T, EnvelopeError> {
    serde_json::from_reader(reader)
        .map_err(|e| EnvelopeError::Storage(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write JSON to a file atomically (write to temp, sync, rename)
///
/// The file is either completely replaced or left as it was.
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), EnvelopeError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent).map_err(|e| write_error("create directory for", path, e))?;
    }

    let temp = temp_path(path);
    let file = File::create(&temp).map_err(|e| write_error("stage", path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)
        .map_err(|e| write_error("serialize", path, e))?;
    writer.flush().map_err(|e| write_error("flush", path, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| write_error("sync", path, e))?;

    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(write_error("replace", path, e));
    }

    if let Some(parent) = parent {
        sync_dir(parent)?;
    }
    Ok(())
}

fn write_error(what: &str, path: &Path, e: impl std::fmt::Display) -> EnvelopeError {
    EnvelopeError::Storage(format!("Failed to {} {}: {}", what, path.display(), e))
}

/// Delete a file; returns whether it existed
pub fn remove_if_exists<P: AsRef<Path>>(path: P) -> Result<bool, EnvelopeError> {
    let path = path.as_ref();
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(EnvelopeError::Storage(format!(
            "Failed to remove {}: {}",
            path.display(),
            e
        ))),
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), EnvelopeError> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| EnvelopeError::Storage(format!("Failed to sync {}: {}", dir.display(), e)))
}

// Directory handles cannot be synced on other platforms
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), EnvelopeError> {
    Ok(())
}
