//! Index pass: node collection and the class registry.
//!
//! Walks each file's tree with an explicit class-name stack, creating file,
//! class, function, and method nodes plus their containment edges. File
//! nodes are created lazily at the first definition encountered, so files
//! with no definitions contribute nothing to the function-granularity graph.

use std::collections::{BTreeSet, HashMap};

use tree_sitter::Node as CstNode;

use common::model::{class_id, file_id};
use common::{EdgeKind, Graph, Node};

use crate::parser::{field_text, FileIndex};

/// Build-wide registry of which files define each class name. Used by the
/// link pass to locate receiver types; dropped when the build completes.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    by_name: HashMap<String, BTreeSet<String>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        ClassRegistry::default()
    }

    pub fn record(&mut self, class_name: &str, rel: &str) {
        self.by_name
            .entry(class_name.to_string())
            .or_default()
            .insert(rel.to_string());
    }

    /// Files defining `class_name`, if any.
    pub fn files(&self, class_name: &str) -> Option<&BTreeSet<String>> {
        self.by_name.get(class_name)
    }
}

/// Runs the index pass over every file, populating `graph` and `registry`.
pub fn collect_nodes(index: &FileIndex, graph: &mut Graph, registry: &mut ClassRegistry) {
    for record in index.values() {
        let root = record.tree.root_node();
        let mut class_stack: Vec<String> = Vec::new();
        visit(
            root,
            record.source.as_bytes(),
            &record.rel,
            graph,
            registry,
            &mut class_stack,
        );
    }
}

fn visit(
    node: CstNode<'_>,
    source: &[u8],
    rel: &str,
    graph: &mut Graph,
    registry: &mut ClassRegistry,
    class_stack: &mut Vec<String>,
) {
    match node.kind() {
        "class_definition" => {
            if let Some(class_name) = field_text(node, "name", source) {
                registry.record(&class_name, rel);

                graph.add_node(Node::file(rel));
                graph.add_node(Node::class(rel, &class_name));
                graph.add_edge(file_id(rel), class_id(rel, &class_name), EdgeKind::Contains);

                class_stack.push(class_name);
                visit_children(node, source, rel, graph, registry, class_stack);
                class_stack.pop();
                return;
            }
        }
        "function_definition" => {
            if let Some(name) = field_text(node, "name", source) {
                graph.add_node(Node::file(rel));

                if let Some(class_name) = class_stack.last() {
                    let method = Node::method(rel, class_name, &name);
                    let method_id = method.id.clone();
                    graph.add_node(method);
                    graph.add_edge(class_id(rel, class_name), method_id.clone(), EdgeKind::Contains);
                    graph.add_edge(file_id(rel), method_id, EdgeKind::Contains);
                } else {
                    let function = Node::function(rel, &name);
                    let function_id = function.id.clone();
                    graph.add_node(function);
                    graph.add_edge(file_id(rel), function_id, EdgeKind::Contains);
                }
            }
        }
        _ => {}
    }

    visit_children(node, source, rel, graph, registry, class_stack);
}

fn visit_children(
    node: CstNode<'_>,
    source: &[u8],
    rel: &str,
    graph: &mut Graph,
    registry: &mut ClassRegistry,
    class_stack: &mut Vec<String>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, source, rel, graph, registry, class_stack);
    }
}
