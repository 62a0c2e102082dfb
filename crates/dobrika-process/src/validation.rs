//! Executable validation.

use dobrika_common::{HarnessError, HarnessResult};
use std::path::{Path, PathBuf};

/// Validate that the server binary exists and resolve it to an absolute path.
///
/// This runs before anything is spawned or any socket is opened, so a bad
/// path fails fast with [`HarnessError::NotFound`].
pub fn validate_executable(path: &Path) -> HarnessResult<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(HarnessError::configuration(
            "Server binary path cannot be empty",
        ));
    }

    if !path.exists() {
        return Err(HarnessError::not_found(path));
    }

    if path.is_dir() {
        return Err(HarnessError::configuration(format!(
            "Server binary path is a directory: {}",
            path.display()
        )));
    }

    Ok(std::fs::canonicalize(path)?)
}
