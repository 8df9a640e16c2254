//! Expanding command-line paths into the list of files the agent may see.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::WalkDir;

/// Extensions picked up when a directory is given.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "ts", "vue", "json", "yml", "md", "js", "jsx", "html", "py", "rs", "toml",
];

/// Expand `paths` into absolute file paths.
///
/// Files are taken as given. Directories are walked recursively in file-name
/// order and only files whose extension is in `extensions` are kept.
pub fn collect_file_paths(paths: &[PathBuf], extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let full = std::path::absolute(path)
            .with_context(|| format!("resolve path {}", path.display()))?;
        let metadata =
            std::fs::metadata(&full).with_context(|| format!("stat {}", full.display()))?;
        if metadata.is_dir() {
            for entry in WalkDir::new(&full).sort_by_file_name() {
                let entry = entry.with_context(|| format!("walk {}", full.display()))?;
                if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(full);
        }
    }
    debug!(count = files.len(), "collected file paths");
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.contains(&ext))
}
