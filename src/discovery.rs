use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, Metadata};
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::models::FileRecord;

/// Stable identifier for a file: hex SHA-256 of its absolute path.
pub fn file_id(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Lower-cased extension with its leading dot, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

pub fn file_record(path: &Path, metadata: &Metadata) -> FileRecord {
    let path_str = path.to_string_lossy().to_string();
    let modified_time = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| DateTime::<Utc>::from(UNIX_EPOCH));

    FileRecord {
        id: file_id(&path_str),
        name: path.file_name().unwrap_or_default().to_string_lossy().to_string(),
        stem: path.file_stem().unwrap_or_default().to_string_lossy().to_string(),
        extension: extension_of(path),
        parent_dir: path
            .parent()
            .map(|parent| parent.to_string_lossy().to_string())
            .unwrap_or_default(),
        size_bytes: metadata.len(),
        modified_time,
        path: path_str,
    }
}

/// Recursively collects files under `root`. An empty `extensions` set accepts
/// every file. Entries that cannot be read are skipped with a warning.
pub fn discover_files(root: &Path, extensions: &HashSet<String>) -> Result<Vec<FileRecord>> {
    let root = fs::canonicalize(root)?;
    info!("Scanning directory: {}", root.display());

    let mut records = Vec::new();
    for entry in WalkDir::new(&root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !extensions.is_empty() && !extensions.contains(&extension_of(path)) {
            continue;
        }

        match entry.metadata() {
            Ok(metadata) => records.push(file_record(path, &metadata)),
            Err(e) => warn!("Skipping file {}: {}", path.display(), e),
        }
    }

    info!("Discovered {} files", records.len());
    Ok(records)
}
