//! Directory layout helpers for the raw tree

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Immediate subdirectories of `root`, sorted, optionally filtered by a glob
/// pattern on the folder name. Hidden folders are never returned.
pub fn list_dirs(root: &Path, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let matcher = pattern
        .map(glob::Pattern::new)
        .transpose()
        .with_context(|| format!("Invalid folder pattern {:?}", pattern))?;

    let mut dirs = Vec::new();
    let entries =
        fs::read_dir(root).with_context(|| format!("Failed to list {}", root.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list {}", root.display()))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        if let Some(ref matcher) = matcher {
            if !matcher.matches(&name) {
                continue;
            }
        }
        dirs.push(path);
    }

    dirs.sort();
    Ok(dirs)
}

/// First non-hidden regular file of a series folder in sorted order
pub fn first_file(dir: &Path) -> Option<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            !entry.file_name().to_string_lossy().starts_with('.')
                && entry.file_type().map(|t| t.is_file()).unwrap_or(false)
        })
        .map(|entry| entry.path())
        .collect();

    files.sort();
    files.into_iter().next()
}

/// The file name of `path` as an owned string, empty when absent
pub fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
