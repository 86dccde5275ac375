//! # Import Alias Extraction
//!
//! Produces the two per-file alias maps the call resolver consumes:
//! *module aliases* (`import M as A` → `A → M`) and *symbol aliases*
//! (`from M import X as A` → `A → M.X`). Maps are scoped to one file and
//! never propagate.

use std::collections::HashMap;
use std::sync::OnceLock;

use tree_sitter::{Node, Query, QueryCursor, StreamingIterator};

use crate::parser::{field_text, node_text};

/// Per-file alias tables, transient to a single build.
#[derive(Debug, Default, Clone)]
pub struct AliasTables {
    /// Local binding → dotted module path.
    pub modules: HashMap<String, String>,
    /// Local binding → dotted module path plus symbol (`pkg.mod.Symbol`).
    pub symbols: HashMap<String, String>,
}

static IMPORT_QUERY: OnceLock<Query> = OnceLock::new();

fn import_query() -> &'static Query {
    IMPORT_QUERY.get_or_init(|| {
        Query::new(
            &tree_sitter_python::LANGUAGE.into(),
            r#"
            (import_statement) @stmt
            (import_from_statement) @stmt
            "#,
        )
        .expect("Invalid import query")
    })
}

/// Collects every import-like statement in the tree, at any depth.
fn import_statements<'t>(root: Node<'t>, source: &[u8]) -> Vec<Node<'t>> {
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(import_query(), root, source);

    let mut statements = Vec::new();
    while let Some(m) = matches.next() {
        for capture in m.captures {
            statements.push(capture.node);
        }
    }
    statements
}

/// The dotted module path of a `from`-import, with leading dots of relative
/// imports stripped. `None` when nothing remains (`from . import x`).
fn from_module(stmt: Node<'_>, source: &[u8]) -> Option<String> {
    let module_node = stmt.child_by_field_name("module_name")?;
    let raw = node_text(module_node, source)?;
    let trimmed = raw.trim_start_matches('.');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Extracts the module- and symbol-alias tables from one file's tree.
pub fn extract_aliases(root: Node<'_>, source: &[u8]) -> AliasTables {
    let mut tables = AliasTables::default();

    for stmt in import_statements(root, source) {
        match stmt.kind() {
            "import_statement" => {
                let mut cursor = stmt.walk();
                for name_node in stmt.children_by_field_name("name", &mut cursor) {
                    match name_node.kind() {
                        "dotted_name" => {
                            if let Some(module) = node_text(name_node, source) {
                                tables.modules.insert(module.clone(), module);
                            }
                        }
                        "aliased_import" => {
                            let module = field_text(name_node, "name", source);
                            let alias = field_text(name_node, "alias", source);
                            if let (Some(module), Some(alias)) = (module, alias) {
                                tables.modules.insert(alias, module);
                            }
                        }
                        _ => {}
                    }
                }
            }
            "import_from_statement" => {
                let Some(module) = from_module(stmt, source) else {
                    continue;
                };
                let mut cursor = stmt.walk();
                for name_node in stmt.children_by_field_name("name", &mut cursor) {
                    match name_node.kind() {
                        "dotted_name" => {
                            if let Some(name) = node_text(name_node, source) {
                                tables
                                    .symbols
                                    .insert(name.clone(), format!("{}.{}", module, name));
                            }
                        }
                        "aliased_import" => {
                            let name = field_text(name_node, "name", source);
                            let alias = field_text(name_node, "alias", source);
                            if let (Some(name), Some(alias)) = (name, alias) {
                                tables
                                    .symbols
                                    .insert(alias, format!("{}.{}", module, name));
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    tables
}

/// Raw module paths referenced by import statements, in file order. Used by
/// the file-granularity pipeline.
pub fn imported_modules(root: Node<'_>, source: &[u8]) -> Vec<String> {
    let mut modules = Vec::new();

    for stmt in import_statements(root, source) {
        match stmt.kind() {
            "import_statement" => {
                let mut cursor = stmt.walk();
                for name_node in stmt.children_by_field_name("name", &mut cursor) {
                    let module = match name_node.kind() {
                        "dotted_name" => node_text(name_node, source),
                        "aliased_import" => field_text(name_node, "name", source),
                        _ => None,
                    };
                    if let Some(module) = module {
                        modules.push(module);
                    }
                }
            }
            "import_from_statement" => {
                if let Some(module) = from_module(stmt, source) {
                    modules.push(module);
                }
            }
            _ => {}
        }
    }

    modules
}
