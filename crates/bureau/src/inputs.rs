//! Normalization and validation of user-supplied inputs.

use surveyor::ResolveMode;

/// Rejects strings carrying raw control characters (TAB, NUL, ESC, ...).
/// Returns a human-readable message for the offending input.
pub fn reject_control_chars(value: &str) -> Option<String> {
    if value.chars().any(|c| (c as u32) < 32) {
        Some(
            "Path contains control characters (e.g. TAB). Use forward slashes like \
             /home/user/project"
                .to_string(),
        )
    } else {
        None
    }
}

/// Maps the accepted resolve-mode spellings onto a [`ResolveMode`].
///
/// `fast`, `no_jedi`, `nojedi`, `fallback`, and `fallback_only` disable the
/// semantic engine; every other value enables it.
pub fn normalize_resolve_mode(value: &str) -> ResolveMode {
    match value.trim().to_ascii_lowercase().as_str() {
        "fast" | "no_jedi" | "nojedi" | "fallback" | "fallback_only" => ResolveMode::FallbackOnly,
        _ => ResolveMode::Semantic,
    }
}

/// Structural query selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Callers,
    Callees,
    Dependencies,
    ReverseDependencies,
    Path,
}

impl QueryType {
    pub const ALLOWED: &'static [&'static str] = &[
        "callers",
        "callees",
        "dependencies",
        "reverse_dependencies",
        "path",
    ];

    /// Parses a query type, accepting the documented synonyms. `None` for
    /// anything unrecognized.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "callers" | "incoming" | "used_by" => Some(QueryType::Callers),
            "callees" | "outgoing" | "calls" => Some(QueryType::Callees),
            "dependencies" | "reachable" | "deps" => Some(QueryType::Dependencies),
            "reverse_dependencies" | "rev_deps" => Some(QueryType::ReverseDependencies),
            "path" => Some(QueryType::Path),
            _ => None,
        }
    }
}
