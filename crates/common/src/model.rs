//! Typed graph model and its serialized `{nodes, edges}` value.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Relationship expressed by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Definition-inside-of: file→class, file→function, file→method, class→method.
    Contains,
    /// Function/method invokes function/method.
    Call,
    /// File-granularity module import.
    Import,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Contains => "contains",
            EdgeKind::Call => "call",
            EdgeKind::Import => "import",
        }
    }
}

/// Node payload, discriminated by the serialized `type` tag.
///
/// Modeled as tagged variants with a small attribute bag per kind rather than
/// an inheritance-style hierarchy; queries pattern-match the tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    File {
        path: String,
    },
    Class {
        file: String,
        name: String,
    },
    Function {
        file: String,
        name: String,
        qualname: String,
    },
    Method {
        file: String,
        name: String,
        qualname: String,
        class_name: String,
    },
}

/// A single node: stable string id plus its typed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    /// File node: `file:<relpath>`.
    pub fn file(rel: &str) -> Self {
        Node {
            id: file_id(rel),
            kind: NodeKind::File {
                path: rel.to_string(),
            },
        }
    }

    /// Class node: `class:<relpath>:<ClassName>`.
    pub fn class(rel: &str, name: &str) -> Self {
        Node {
            id: class_id(rel, name),
            kind: NodeKind::Class {
                file: rel.to_string(),
                name: name.to_string(),
            },
        }
    }

    /// Top-level function node: `func:<relpath>:<name>` with `qualname = name`.
    pub fn function(rel: &str, name: &str) -> Self {
        Node {
            id: func_id(rel, name),
            kind: NodeKind::Function {
                file: rel.to_string(),
                name: name.to_string(),
                qualname: name.to_string(),
            },
        }
    }

    /// Method node: `func:<relpath>:<Class>.<name>`.
    pub fn method(rel: &str, class_name: &str, name: &str) -> Self {
        let qualname = format!("{}.{}", class_name, name);
        Node {
            id: func_id(rel, &qualname),
            kind: NodeKind::Method {
                file: rel.to_string(),
                name: name.to_string(),
                qualname,
                class_name: class_name.to_string(),
            },
        }
    }

    /// Serialized `type` tag of this node.
    pub fn type_tag(&self) -> &'static str {
        match self.kind {
            NodeKind::File { .. } => "file",
            NodeKind::Class { .. } => "class",
            NodeKind::Function { .. } => "function",
            NodeKind::Method { .. } => "method",
        }
    }

    /// Relpath of the file this node belongs to (the path itself for files).
    pub fn file_rel(&self) -> &str {
        match &self.kind {
            NodeKind::File { path } => path,
            NodeKind::Class { file, .. }
            | NodeKind::Function { file, .. }
            | NodeKind::Method { file, .. } => file,
        }
    }

    /// Simple name; `None` for file nodes.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::File { .. } => None,
            NodeKind::Class { name, .. }
            | NodeKind::Function { name, .. }
            | NodeKind::Method { name, .. } => Some(name),
        }
    }

    /// Qualified name: simple name for functions, `Class.method` for methods.
    pub fn qualname(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Function { qualname, .. } | NodeKind::Method { qualname, .. } => {
                Some(qualname)
            }
            NodeKind::Class { name, .. } => Some(name),
            NodeKind::File { .. } => None,
        }
    }
}

/// Id of a file node.
pub fn file_id(rel: &str) -> String {
    format!("file:{}", rel)
}

/// Id of a class node.
pub fn class_id(rel: &str, name: &str) -> String {
    format!("class:{}:{}", rel, name)
}

/// Id of a function or method node. A `.` in `qualname` marks a method.
pub fn func_id(rel: &str, qualname: &str) -> String {
    format!("func:{}:{}", rel, qualname)
}

/// A directed edge. Serializes as `{source, target, type}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

/// Mutable graph used during a build.
///
/// Nodes keep insertion order and the first insert of an id wins; edges are a
/// set keyed by the full `(source, target, type)` triple, so repeated adds
/// collapse. Once a build completes the graph is frozen into [`GraphData`].
#[derive(Debug, Default)]
pub struct Graph {
    nodes: IndexMap<String, Node>,
    edges: IndexSet<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    /// Adds a node unless one with the same id already exists.
    pub fn add_node(&mut self, node: Node) {
        self.nodes.entry(node.id.clone()).or_insert(node);
    }

    /// Adds an edge; duplicate triples are ignored.
    pub fn add_edge(&mut self, source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) {
        self.edges.insert(Edge {
            source: source.into(),
            target: target.into(),
            kind,
        });
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Freezes the graph into its serialized value, preserving node insertion
    /// order. Edge order is the (deterministic) insertion order of first adds.
    pub fn into_data(self) -> GraphData {
        GraphData {
            nodes: self.nodes.into_values().collect(),
            edges: self.edges.into_iter().collect(),
        }
    }
}

/// The serialized graph value: everything downstream sees only this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphData {
    /// Linear node lookup; callers that query repeatedly build their own index.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }
}
