//! Tree-sitter based Python parsing and the per-build file index.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tree_sitter::{Node, Parser, Tree};

use crate::{discover, SurveyorError};

/// Parser wrapper with the Python grammar loaded.
pub struct ParserHost {
    parser: Parser,
}

impl ParserHost {
    /// Creates a new host.
    ///
    /// # Errors
    /// Returns `SurveyorError::ParseFailure` if the tree-sitter parser
    /// fails to initialize with the Python language.
    pub fn new() -> Result<Self, SurveyorError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| {
                SurveyorError::ParseFailure(format!("Failed to load Python grammar: {}", e))
            })?;
        Ok(Self { parser })
    }

    /// Parses source text into a CST. `None` only on severe parser failure;
    /// syntax errors produce a recovered tree instead.
    pub fn parse_source(&mut self, source: &str) -> Option<Tree> {
        self.parser.parse(source, None)
    }
}

/// One indexed source file.
pub struct FileRecord {
    /// Root-relative path, forward slashes.
    pub rel: String,
    /// Raw source text.
    pub source: String,
    /// Parsed syntax tree over `source`.
    pub tree: Tree,
}

/// Absolute path → parsed record, in discovery order.
pub type FileIndex = IndexMap<PathBuf, FileRecord>;

/// Discovers and parses every source file under `root`.
///
/// Files that cannot be read as UTF-8 or that the parser rejects contribute
/// nothing and are skipped silently.
///
/// # Errors
/// Only root canonicalization can fail; per-file problems never do.
pub fn parse_files(root: &Path, host: &mut ParserHost) -> Result<FileIndex, SurveyorError> {
    let root = dunce::canonicalize(root)?;
    let mut index = FileIndex::new();

    for path in discover::source_files(&root) {
        let source = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };

        let Some(tree) = host.parse_source(&source) else {
            tracing::debug!(path = %path.display(), "skipping unparseable file");
            continue;
        };

        let canonical = dunce::canonicalize(&path).unwrap_or_else(|_| path.clone());
        let rel = match common::relative_path(&root, &canonical) {
            Ok(rel) => rel,
            Err(_) => continue,
        };

        index.insert(canonical, FileRecord { rel, source, tree });
    }

    Ok(index)
}

/// UTF-8 text of a node, or `None` when the slice is not valid UTF-8.
pub(crate) fn node_text(node: Node<'_>, source: &[u8]) -> Option<String> {
    node.utf8_text(source).ok().map(|s| s.to_string())
}

/// Text of a named field of `node`.
pub(crate) fn field_text(node: Node<'_>, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .and_then(|n| node_text(n, source))
}
