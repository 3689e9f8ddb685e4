// oppsift - platform/fs.rs
//
// Filesystem helpers for the command-line front end: reading the upload
// and writing downloads atomically (write temp, rename final) so a crash
// never leaves a half-written export behind.

use crate::util::error::OppsiftError;
use std::path::{Path, PathBuf};

/// Read a whole file, tagging errors with the path and operation.
pub fn read_file(path: &Path, operation: &'static str) -> Result<Vec<u8>, OppsiftError> {
    std::fs::read(path).map_err(|source| OppsiftError::Io {
        path: path.to_path_buf(),
        operation,
        source,
    })
}

/// Write `bytes` to `dir/file_name` atomically.
///
/// Creates `dir` as needed and returns the final path.
pub fn write_atomic(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, OppsiftError> {
    std::fs::create_dir_all(dir).map_err(|source| OppsiftError::Io {
        path: dir.to_path_buf(),
        operation: "create output directory",
        source,
    })?;

    let path = dir.join(file_name);
    let tmp = dir.join(format!("{file_name}.tmp"));

    std::fs::write(&tmp, bytes).map_err(|source| OppsiftError::Io {
        path: tmp.clone(),
        operation: "write temp file",
        source,
    })?;

    std::fs::rename(&tmp, &path).map_err(|source| {
        // Clean up the temp file on failure; ignore any secondary error.
        let _ = std::fs::remove_file(&tmp);
        OppsiftError::Io {
            path: path.clone(),
            operation: "finalise output file",
            source,
        }
    })?;

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "File written");
    Ok(path)
}
