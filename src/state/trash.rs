//! Recoverable deletion: relayed files move into the trash directory
//! instead of being unlinked.

use crate::utils::errors::{RelayError, Result};
use std::path::{Path, PathBuf};

/// Move `file` into `trash_dir`, keeping the filename. A name collision
/// gets a timestamp suffix. Falls back to copy + remove when the rename
/// crosses filesystems.
pub fn move_to_trash(file: &Path, trash_dir: &Path) -> Result<PathBuf> {
    let name = file
        .file_name()
        .ok_or_else(|| RelayError::State(format!("no filename in {}", file.display())))?;

    let mut dest = trash_dir.join(name);
    if dest.exists() {
        dest = trash_dir.join(format!(
            "{}.{}",
            name.to_string_lossy(),
            chrono::Local::now().format("%Y%m%d%H%M%S")
        ));
    }

    match std::fs::rename(file, &dest) {
        Ok(()) => Ok(dest),
        Err(_) => {
            std::fs::copy(file, &dest)?;
            std::fs::remove_file(file)?;
            Ok(dest)
        }
    }
}
