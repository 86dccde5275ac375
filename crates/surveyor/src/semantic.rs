//! Pluggable semantic name-inference engine.
//!
//! The link pass consults an engine implementing [`SemanticResolver`] when
//! the resolve mode enables it. Engines are queried per call site and may
//! keep project-level state worth reusing across resolutions of one build.
//! Everything downstream tolerates an absent engine, an engine returning
//! nothing, and an engine that fails at a single call site.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tree_sitter::Parser;

use crate::aliases;
use crate::discover::SOURCE_EXT;

/// One definition inferred for a name at a source position.
#[derive(Debug, Clone)]
pub struct InferredDefinition {
    /// Simple name of the definition.
    pub name: String,
    /// Absolute path of the defining module, if the engine located one.
    pub module_path: Option<PathBuf>,
    /// Dotted module name (`utils.e`).
    pub module_name: Option<String>,
    /// Fully-qualified name (`utils.e.AuditLogger.audit`).
    pub full_name: Option<String>,
}

/// A name-inference engine queried at call-site positions.
///
/// `line` is 1-based, `col` is a 0-based column into that line. For
/// attribute calls the caller queries at the trailing attribute token.
pub trait SemanticResolver {
    fn infer(
        &self,
        source: &str,
        path: &Path,
        root: &Path,
        line: usize,
        col: usize,
    ) -> Vec<InferredDefinition>;
}

/// Per-module facts the built-in engine caches between call sites.
#[derive(Debug, Clone, Default)]
struct ModuleFacts {
    /// Names defined at module top level (functions and classes).
    toplevel: HashSet<String>,
    /// Symbol-alias table of the module.
    symbol_aliases: HashMap<String, String>,
}

/// Built-in project-scoped inference engine.
///
/// Resolves bare-name call sites to top-level definitions of the same file,
/// or through the file's symbol aliases to a top-level definition of the
/// imported module. Attribute receivers are out of its scope; the receiver
/// type strategies of the link pass own those.
pub struct ProjectInference {
    root: PathBuf,
    facts: Mutex<HashMap<PathBuf, Option<ModuleFacts>>>,
}

impl ProjectInference {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ProjectInference {
            root: root.into(),
            facts: Mutex::new(HashMap::new()),
        }
    }

    fn module_name_of(&self, path: &Path) -> Option<String> {
        let rel = common::relative_path(&self.root, path).ok()?;
        let stem = rel.strip_suffix(&format!(".{}", SOURCE_EXT))?;
        Some(stem.replace('/', "."))
    }

    /// Facts for `path`, parsing `source` on first use. When `source` is
    /// `None` the file is read from disk.
    fn facts_for(&self, path: &Path, source: Option<&str>) -> Option<ModuleFacts> {
        let mut cache = self.facts.lock().ok()?;
        if let Some(cached) = cache.get(path) {
            return cached.clone();
        }

        let owned;
        let text = match source {
            Some(s) => s,
            None => {
                owned = std::fs::read_to_string(path).ok();
                match owned.as_deref() {
                    Some(s) => s,
                    None => {
                        cache.insert(path.to_path_buf(), None);
                        return None;
                    }
                }
            }
        };

        let facts = extract_facts(text);
        cache.insert(path.to_path_buf(), facts.clone());
        facts
    }

    fn definition_at(
        &self,
        module_path: &Path,
        module_name: &str,
        name: &str,
    ) -> InferredDefinition {
        InferredDefinition {
            name: name.to_string(),
            module_path: Some(module_path.to_path_buf()),
            module_name: Some(module_name.to_string()),
            full_name: Some(format!("{}.{}", module_name, name)),
        }
    }
}

impl SemanticResolver for ProjectInference {
    fn infer(
        &self,
        source: &str,
        path: &Path,
        _root: &Path,
        line: usize,
        col: usize,
    ) -> Vec<InferredDefinition> {
        let Some(name) = identifier_at(source, line, col) else {
            return Vec::new();
        };
        let Some(facts) = self.facts_for(path, Some(source)) else {
            return Vec::new();
        };

        // Same-file top-level definition.
        if facts.toplevel.contains(&name) {
            if let Some(module_name) = self.module_name_of(path) {
                return vec![self.definition_at(path, &module_name, &name)];
            }
            return Vec::new();
        }

        // Symbol alias into another in-project module.
        if let Some(full) = facts.symbol_aliases.get(&name) {
            if let Some((module, tail)) = full.rsplit_once('.') {
                let target = self
                    .root
                    .join(format!("{}.{}", module.replace('.', "/"), SOURCE_EXT));
                if let Some(target_facts) = self.facts_for(&target, None) {
                    if target_facts.toplevel.contains(tail) {
                        return vec![self.definition_at(&target, module, tail)];
                    }
                }
            }
        }

        Vec::new()
    }
}

/// Parses a module and extracts its top-level definition names and symbol
/// aliases. `None` when the parser rejects the source outright.
fn extract_facts(source: &str) -> Option<ModuleFacts> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .ok()?;
    let tree = parser.parse(source, None)?;
    let root = tree.root_node();
    let bytes = source.as_bytes();

    let mut toplevel = HashSet::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        let definition = match child.kind() {
            "function_definition" | "class_definition" => Some(child),
            "decorated_definition" => child.child_by_field_name("definition"),
            _ => None,
        };
        if let Some(def) = definition {
            if let Some(name) = crate::parser::field_text(def, "name", bytes) {
                toplevel.insert(name);
            }
        }
    }

    let tables = aliases::extract_aliases(root, bytes);
    Some(ModuleFacts {
        toplevel,
        symbol_aliases: tables.symbols,
    })
}

/// The identifier occupying column `col` (0-based) on `line` (1-based).
fn identifier_at(source: &str, line: usize, col: usize) -> Option<String> {
    let text = source.lines().nth(line.checked_sub(1)?)?;
    let chars: Vec<char> = text.chars().collect();
    let first = *chars.get(col)?;
    if !(first.is_alphanumeric() || first == '_') {
        return None;
    }

    let name: String = chars[col..]
        .iter()
        .take_while(|c| c.is_alphanumeric() || **c == '_')
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_identifier_at() {
        assert_eq!(identifier_at("    log(msg)\n", 1, 4).unwrap(), "log");
        assert_eq!(identifier_at("x = add_nums(1)", 1, 4).unwrap(), "add_nums");
        assert!(identifier_at("x = (1)", 1, 4).is_none());
    }

    #[test]
    fn test_same_file_toplevel_inference() {
        let tmp = std::env::temp_dir().join("test_semantic_samefile");
        fs::remove_dir_all(&tmp).ok();
        fs::create_dir_all(&tmp).ok();
        let source = "def log(msg):\n    pass\n\nclass AuditLogger:\n    def audit(self, msg):\n        log(msg)\n";
        let path = tmp.join("e.py");
        fs::write(&path, source).ok();

        let engine = ProjectInference::new(&tmp);
        // Position of `log` inside `audit` (line 6, col 8).
        let defs = engine.infer(source, &path, &tmp, 6, 8);

        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "log");
        assert_eq!(defs[0].module_name.as_deref(), Some("e"));
        assert_eq!(defs[0].full_name.as_deref(), Some("e.log"));

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_alias_target_inference() {
        let tmp = std::env::temp_dir().join("test_semantic_alias");
        fs::remove_dir_all(&tmp).ok();
        fs::create_dir_all(tmp.join("utils")).ok();
        fs::write(tmp.join("utils/c.py"), "def add(a, b):\n    return a + b\n").ok();

        let source = "from utils.c import add as add_nums\n\ndef process(v):\n    return add_nums(v, 7)\n";
        let path = tmp.join("b.py");
        fs::write(&path, source).ok();

        let engine = ProjectInference::new(&tmp);
        // Position of `add_nums` on line 4.
        let defs = engine.infer(source, &path, &tmp, 4, 11);

        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "add");
        assert_eq!(defs[0].full_name.as_deref(), Some("utils.c.add"));
        assert!(defs[0]
            .module_path
            .as_ref()
            .unwrap()
            .ends_with("utils/c.py"));

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_attribute_names_decline() {
        let tmp = std::env::temp_dir().join("test_semantic_attr");
        fs::remove_dir_all(&tmp).ok();
        fs::create_dir_all(&tmp).ok();
        let source = "def run(obj):\n    obj.execute()\n";
        let path = tmp.join("m.py");
        fs::write(&path, source).ok();

        let engine = ProjectInference::new(&tmp);
        // Position of `execute`: not a top-level name, no alias — nothing.
        let defs = engine.infer(source, &path, &tmp, 2, 8);
        assert!(defs.is_empty());

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_unknown_name_yields_nothing() {
        let tmp = std::env::temp_dir().join("test_semantic_unknown");
        fs::remove_dir_all(&tmp).ok();
        fs::create_dir_all(&tmp).ok();
        let source = "def run():\n    mystery()\n";
        let path = tmp.join("m.py");
        fs::write(&path, source).ok();

        let engine = ProjectInference::new(&tmp);
        let defs = engine.infer(source, &path, &tmp, 2, 4);
        assert!(defs.is_empty());

        fs::remove_dir_all(tmp).ok();
    }
}
