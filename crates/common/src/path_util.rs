//! Path normalization utilities for cross-platform file handling.

use std::path::Path;

/// Errors from path normalization.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Non-UTF-8 path: {0}")]
    NonUtf8(String),

    #[error("Path {path} is not under root {root}")]
    OutsideRoot { path: String, root: String },
}

/// Normalizes a file path to a canonical UTF-8 string with forward slashes.
///
/// Canonicalizes via `dunce::canonicalize` (strips the `\\?\` prefix on
/// Windows), then replaces backslashes with forward slashes.
///
/// # Errors
/// - `PathError::Io` if canonicalization fails (file not found, permissions).
/// - `PathError::NonUtf8` if the path contains non-UTF-8 characters.
pub fn normalize_path(path: &Path) -> Result<String, PathError> {
    let canonical = dunce::canonicalize(path)?;
    let s = canonical
        .to_str()
        .ok_or_else(|| PathError::NonUtf8(canonical.to_string_lossy().into_owned()))?;
    Ok(s.replace('\\', "/"))
}

/// Computes the root-relative path of `path`, forward-slash separated.
///
/// Both arguments should already be canonical absolute paths.
pub fn relative_path(root: &Path, path: &Path) -> Result<String, PathError> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| PathError::OutsideRoot {
            path: path.display().to_string(),
            root: root.display().to_string(),
        })?;
    let s = rel
        .to_str()
        .ok_or_else(|| PathError::NonUtf8(rel.to_string_lossy().into_owned()))?;
    Ok(s.replace('\\', "/"))
}
