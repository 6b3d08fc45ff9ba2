use std::fs;
use std::path::{Path, PathBuf};

use crate::{AppError, AppResult};

/// Naming suffix of compressed dump files in the backup directory.
pub const DUMP_SUFFIX: &str = ".sql.gz";

/// Pick the newest backup in `dir`.
///
/// "Newest" is the lexicographically greatest matching filename; the nightly
/// dumps embed a sortable timestamp in the name, and that naming convention
/// is the only recency signal used. Modification times are ignored.
pub fn latest_backup(dir: &Path) -> AppResult<PathBuf> {
    let entries = fs::read_dir(dir).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "read_backup_dir")
            .with_context("path", dir.display().to_string())
    })?;

    let mut names: Vec<String> = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "skip_unreadable_backup_entry");
                continue;
            }
        };
        if !entry.path().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(DUMP_SUFFIX) {
                names.push(name.to_string());
            }
        }
    }

    names.sort();
    match names.pop() {
        Some(name) => Ok(dir.join(name)),
        None => Err(AppError::new(
            "BACKUP/NOT_FOUND",
            "No backup files found",
        )
        .with_context("path", dir.display().to_string())
        .with_context("suffix", DUMP_SUFFIX)),
    }
}
