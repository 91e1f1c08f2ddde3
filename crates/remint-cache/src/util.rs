use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::{CacheError, Result};

/// Writes `bytes` to `path` atomically.
///
/// The content goes into a uniquely named temp file in the destination
/// directory and is published with a rename, so readers never observe a
/// partial blob. Concurrent writers race on the final rename; for the
/// content cache that race is benign because both sides carry identical
/// bytes.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => return Err(CacheError::NoFileName(path.to_path_buf())),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    match tmp.persist(path) {
        Ok(_) => Ok(()),
        Err(persist_err) => {
            // Windows refuses to rename over an existing file; clear the
            // destination and publish again.
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
            persist_err
                .file
                .persist(path)
                .map(|_| ())
                .map_err(|err| CacheError::from(err.error))
        }
    }
}
