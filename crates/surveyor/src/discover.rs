//! Source-file discovery: directory walk with a fixed exclusion set.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into. Dot-prefixed directories are
/// excluded independently of this list.
pub const EXCLUDED_DIRS: &[&str] = &[
    ".venv",
    "venv",
    "env",
    "__pycache__",
    ".git",
    "site-packages",
    "node_modules",
    "dist",
    "build",
];

/// File extension of the sources this crate parses.
pub const SOURCE_EXT: &str = "py";

/// Returns `true` if a directory with this name must be skipped.
pub fn is_excluded_dir(name: &str) -> bool {
    name.starts_with('.') || EXCLUDED_DIRS.contains(&name)
}

fn keep_entry(entry: &DirEntry) -> bool {
    // The exclusion rules apply to directories below the root, not the root
    // itself and not to files.
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    match entry.file_name().to_str() {
        Some(name) => !is_excluded_dir(name),
        None => false,
    }
}

/// Walks `root` and returns the absolute paths of all source files, pruning
/// excluded and dot-prefixed directories. Unreadable entries are skipped.
pub fn source_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(keep_entry)
        .flatten()
    {
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().and_then(|s| s.to_str()) == Some(SOURCE_EXT)
        {
            files.push(path.to_path_buf());
        }
    }

    files
}
