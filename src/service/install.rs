//! Atomic installation of rendered definition files.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use uuid::Uuid;

use crate::error::ServiceResult;

/// Write `content` to `path` through a uniquely named temporary file and
/// an atomic rename, so a crash mid-write never leaves a torn definition.
pub(crate) fn write_atomic(path: &Path, content: &str) -> ServiceResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    // Random suffix keeps concurrent installs from colliding on the
    // temporary name.
    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        Uuid::new_v4().simple()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;

    fs::rename(&temp_path, path)?;
    Ok(())
}
