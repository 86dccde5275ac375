//! Link pass: call-site resolution.
//!
//! For every call expression inside a function or method body the resolver
//! tries a fixed ladder of strategies and stops at the first that yields any
//! targets:
//!
//! 1. **Syntactic fallback** — alias-table lookups for `name(...)`,
//!    `mod_alias.attr(...)`, and `symbol_alias.attr(...)` shapes.
//! 2. **Semantic inference** — the pluggable engine, queried at the name
//!    token (for attribute calls, at the trailing attribute token).
//! 3. **Receiver typing** — the function-scoped constructor-assignment
//!    table, then the chained `Class(...).method(...)` form.
//! 4. **Unique-name last resort** — a single method anywhere in the project
//!    carrying the attribute name. Two or more candidates means no edge;
//!    this ambiguity rule is what keeps precision acceptable.
//!
//! Resolved targets become `call` edges only when the callee id exists in
//! the graph; everything else is dropped without comment.

use std::collections::HashMap;
use std::path::Path;

use tree_sitter::Node as CstNode;

use common::model::func_id;
use common::{EdgeKind, Graph};

use crate::aliases::AliasTables;
use crate::collect::ClassRegistry;
use crate::discover::SOURCE_EXT;
use crate::parser::{field_text, node_text, FileRecord};
use crate::semantic::{InferredDefinition, SemanticResolver};

/// Snapshot of all method nodes, keyed by simple name. Built once between
/// the index pass and the link pass; the link pass adds no nodes, so the
/// snapshot stays valid for the whole pass.
#[derive(Debug, Default)]
pub struct MethodIndex {
    by_name: HashMap<String, Vec<(String, String)>>,
}

impl MethodIndex {
    pub fn from_graph(graph: &Graph) -> Self {
        let mut by_name: HashMap<String, Vec<(String, String)>> = HashMap::new();
        for node in graph.nodes() {
            if node.type_tag() == "method" {
                if let (Some(name), Some(qualname)) = (node.name(), node.qualname()) {
                    by_name
                        .entry(name.to_string())
                        .or_default()
                        .push((node.file_rel().to_string(), qualname.to_string()));
                }
            }
        }
        MethodIndex { by_name }
    }

    fn candidates(&self, name: &str) -> &[(String, String)] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Shared state of the link pass across all files of one build.
pub struct LinkContext<'a> {
    pub graph: &'a mut Graph,
    pub registry: &'a ClassRegistry,
    pub methods: &'a MethodIndex,
    pub engine: Option<&'a dyn SemanticResolver>,
    pub root: &'a Path,
    pub include_external: bool,
    pub use_semantic: bool,
}

/// Resolves every call site in one file and adds the resulting `call` edges.
pub fn link_calls(path: &Path, record: &FileRecord, tables: &AliasTables, ctx: &mut LinkContext<'_>) {
    let mut walker = CallWalker {
        rel: &record.rel,
        source: &record.source,
        path,
        tables,
        ctx,
        current_class: None,
        current_func: None,
        local_types: HashMap::new(),
    };
    walker.visit(record.tree.root_node());
}

fn module_rel(module: &str) -> String {
    format!("{}.{}", module.replace('.', "/"), SOURCE_EXT)
}

struct CallWalker<'w, 'a> {
    rel: &'w str,
    source: &'w str,
    path: &'w Path,
    tables: &'w AliasTables,
    ctx: &'w mut LinkContext<'a>,
    current_class: Option<String>,
    /// Qualified name of the enclosing function (`name` or `Class.name`).
    current_func: Option<String>,
    /// Variable → `(class_relpath, ClassName)`, scoped to the current function.
    local_types: HashMap<String, (String, String)>,
}

impl CallWalker<'_, '_> {
    fn src(&self) -> &[u8] {
        self.source.as_bytes()
    }

    fn visit(&mut self, node: CstNode<'_>) {
        match node.kind() {
            "class_definition" => {
                let prev = self.current_class.take();
                self.current_class = field_text(node, "name", self.src());
                self.visit_children(node);
                self.current_class = prev;
                return;
            }
            "function_definition" => {
                if let Some(name) = field_text(node, "name", self.src()) {
                    let prev_func = self.current_func.take();
                    let prev_types = std::mem::take(&mut self.local_types);

                    self.current_func = Some(match &self.current_class {
                        Some(class_name) => format!("{}.{}", class_name, name),
                        None => name,
                    });

                    self.visit_children(node);

                    self.local_types = prev_types;
                    self.current_func = prev_func;
                    return;
                }
            }
            "assignment" => self.capture_ctor_assignment(node),
            "call" => self.handle_call(node),
            _ => {}
        }
        self.visit_children(node);
    }

    fn visit_children(&mut self, node: CstNode<'_>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }
    }

    /// Records `var = Ctor(...)` (plain or annotated) into the local-type
    /// table when the constructor's class can be located.
    fn capture_ctor_assignment(&mut self, node: CstNode<'_>) {
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let Some(right) = node.child_by_field_name("right") else {
            return;
        };
        if right.kind() != "call" {
            return;
        }
        let Some(class_name) = right
            .child_by_field_name("function")
            .and_then(|ctor| self.constructor_name(ctor))
        else {
            return;
        };
        let Some(resolved) = self.resolve_class_to_rel(&class_name) else {
            return;
        };
        if let Some(var) = node_text(left, self.src()) {
            self.local_types.insert(var, resolved);
        }
    }

    /// Class name referenced by a constructor expression: a direct `Name`
    /// or the trailing attribute of `pkg.ClassName`.
    fn constructor_name(&self, ctor: CstNode<'_>) -> Option<String> {
        match ctor.kind() {
            "identifier" => node_text(ctor, self.src()),
            "attribute" => field_text(ctor, "attribute", self.src()),
            _ => None,
        }
    }

    /// Locates the file defining `class_name` as seen from the current file:
    /// symbol aliases first, then the class registry (unique definition, or
    /// the current file when it is among the candidates).
    fn resolve_class_to_rel(&self, class_name: &str) -> Option<(String, String)> {
        if let Some(full) = self.tables.symbols.get(class_name) {
            let (module, real_class) = full.rsplit_once('.')?;
            return Some((module_rel(module), real_class.to_string()));
        }

        let hits = self.ctx.registry.files(class_name)?;
        if hits.len() == 1 {
            return Some((hits.iter().next()?.clone(), class_name.to_string()));
        }
        if hits.contains(self.rel) {
            return Some((self.rel.to_string(), class_name.to_string()));
        }
        None
    }

    fn handle_call(&mut self, node: CstNode<'_>) {
        let Some(current_func) = self.current_func.clone() else {
            return;
        };
        let Some(func_node) = node.child_by_field_name("function") else {
            return;
        };

        let caller_id = func_id(self.rel, &current_func);

        let mut targets = self.resolve_fallback(func_node);
        if targets.is_empty() && self.ctx.use_semantic {
            targets = self.resolve_semantic(func_node);
        }
        if targets.is_empty() && func_node.kind() == "attribute" {
            targets = self.resolve_receiver(func_node);
        }
        if targets.is_empty() && func_node.kind() == "attribute" {
            targets = self.resolve_unique_method(func_node);
        }

        for (target_rel, target_name) in targets {
            let callee_id = func_id(&target_rel, &target_name);
            if self.ctx.graph.has_node(&callee_id) {
                self.ctx
                    .graph
                    .add_edge(caller_id.clone(), callee_id, EdgeKind::Call);
            }
        }
    }

    /// Strategy 1: alias-table lookups, no inference.
    fn resolve_fallback(&self, func_node: CstNode<'_>) -> Vec<(String, String)> {
        match func_node.kind() {
            "identifier" => {
                let Some(name) = node_text(func_node, self.src()) else {
                    return Vec::new();
                };
                if let Some(full) = self.tables.symbols.get(&name) {
                    if let Some((module, real_name)) = full.rsplit_once('.') {
                        return vec![(module_rel(module), real_name.to_string())];
                    }
                }
                Vec::new()
            }
            "attribute" => {
                let Some(object) = func_node.child_by_field_name("object") else {
                    return Vec::new();
                };
                if object.kind() != "identifier" {
                    return Vec::new();
                }
                let (Some(alias), Some(attr)) = (
                    node_text(object, self.src()),
                    field_text(func_node, "attribute", self.src()),
                ) else {
                    return Vec::new();
                };

                if let Some(module) = self.tables.modules.get(&alias) {
                    return vec![(module_rel(module), attr)];
                }
                // A symbol alias already names a concrete symbol; the
                // attribute is ignored. Correct for re-export chains, wrong
                // for attribute access on imported values — the semantic
                // engine cleans that up when enabled.
                if let Some(full) = self.tables.symbols.get(&alias) {
                    if let Some((module, real_name)) = full.rsplit_once('.') {
                        return vec![(module_rel(module), real_name.to_string())];
                    }
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Strategy 2: the semantic engine, queried at the name token.
    fn resolve_semantic(&self, func_node: CstNode<'_>) -> Vec<(String, String)> {
        let Some(engine) = self.ctx.engine else {
            return Vec::new();
        };

        let point = if func_node.kind() == "attribute" {
            func_node
                .child_by_field_name("attribute")
                .map(|n| n.start_position())
                .unwrap_or_else(|| func_node.start_position())
        } else {
            func_node.start_position()
        };

        let definitions = engine.infer(
            self.source,
            self.path,
            self.ctx.root,
            point.row + 1,
            point.column,
        );
        self.targets_from_definitions(definitions)
    }

    fn targets_from_definitions(
        &self,
        definitions: Vec<InferredDefinition>,
    ) -> Vec<(String, String)> {
        let mut targets = Vec::new();

        for def in definitions {
            let rel = def.module_path.as_ref().and_then(|p| {
                let canonical = dunce::canonicalize(p).unwrap_or_else(|_| p.clone());
                common::relative_path(self.ctx.root, &canonical).ok()
            });

            match rel {
                Some(rel) => {
                    // Prefer the fully-qualified suffix so methods come out
                    // as `Class.method`, not just `method`.
                    let mut target_name = def.name.clone();
                    if let (Some(full), Some(module)) = (&def.full_name, &def.module_name) {
                        if let Some(suffix) = full.strip_prefix(&format!("{}.", module)) {
                            target_name = suffix.to_string();
                        }
                    }
                    targets.push((rel, target_name));
                }
                None if self.ctx.include_external => {
                    targets.push((format!("<external>:{}", def.name), def.name));
                }
                None => {}
            }
        }

        targets
    }

    /// Strategy 3: receiver-type inference for `var.method()` and
    /// `Class(...).method(...)` shapes.
    fn resolve_receiver(&self, func_node: CstNode<'_>) -> Vec<(String, String)> {
        let Some(method_name) = field_text(func_node, "attribute", self.src()) else {
            return Vec::new();
        };
        let Some(receiver) = func_node.child_by_field_name("object") else {
            return Vec::new();
        };

        match receiver.kind() {
            "identifier" => {
                let Some(var) = node_text(receiver, self.src()) else {
                    return Vec::new();
                };
                if let Some((class_rel, class_name)) = self.local_types.get(&var) {
                    return vec![(
                        class_rel.clone(),
                        format!("{}.{}", class_name, method_name),
                    )];
                }
                Vec::new()
            }
            "call" => {
                let Some(class_name) = receiver
                    .child_by_field_name("function")
                    .and_then(|ctor| self.constructor_name(ctor))
                else {
                    return Vec::new();
                };
                if let Some((class_rel, real_class)) = self.resolve_class_to_rel(&class_name) {
                    return vec![(class_rel, format!("{}.{}", real_class, method_name))];
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Strategy 4: emit only when exactly one method in the whole project
    /// carries the attribute name.
    fn resolve_unique_method(&self, func_node: CstNode<'_>) -> Vec<(String, String)> {
        let Some(method_name) = field_text(func_node, "attribute", self.src()) else {
            return Vec::new();
        };
        match self.ctx.methods.candidates(&method_name) {
            [only] => vec![only.clone()],
            _ => Vec::new(),
        }
    }
}
