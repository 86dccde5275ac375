//! Focused subgraph extraction and line-oriented export formats.

use std::collections::{BTreeSet, HashMap, VecDeque};

use serde::Serialize;

use common::{EdgeKind, GraphData};

/// Edge types rendered when the caller does not choose any.
pub const DEFAULT_EDGE_TYPES: &[EdgeKind] = &[EdgeKind::Call];

/// Default node cap for exports.
pub const DEFAULT_MAX_NODES: usize = 200;

/// Traversal direction around the focus node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Out,
    In,
    Both,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Out => "out",
            Direction::In => "in",
            Direction::Both => "both",
        }
    }

    /// `"in"` and `"both"` select those directions; anything else is `out`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "in" => Direction::In,
            "both" => Direction::Both,
            _ => Direction::Out,
        }
    }

    fn outward(&self) -> bool {
        matches!(self, Direction::Out | Direction::Both)
    }

    fn inward(&self) -> bool {
        matches!(self, Direction::In | Direction::Both)
    }
}

/// Export bookkeeping returned alongside the rendered text.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExportMeta {
    pub focus: Option<String>,
    pub edge_types: Vec<String>,
    pub direction: String,
    pub depth: usize,
    pub nodes_rendered: usize,
    pub edges_rendered: usize,
    pub truncated: bool,
}

struct Subgraph {
    nodes: Vec<String>,
    edges: Vec<(String, String)>,
    truncated: bool,
}

fn filtered_edges<'a>(
    data: &'a GraphData,
    edge_types: &'a [EdgeKind],
) -> impl Iterator<Item = (&'a str, &'a str)> {
    data.edges
        .iter()
        .filter(move |e| edge_types.contains(&e.kind))
        .map(|e| (e.source.as_str(), e.target.as_str()))
}

/// Bounded BFS around `focus`; with no focus, the first `max_nodes` nodes
/// and their induced edge subset.
fn collect_subgraph(
    data: &GraphData,
    focus: Option<&str>,
    direction: Direction,
    depth: usize,
    edge_types: &[EdgeKind],
    max_nodes: usize,
) -> Subgraph {
    let Some(focus) = focus else {
        let all: Vec<&str> = data.nodes.iter().map(|n| n.id.as_str()).collect();
        let truncated = all.len() > max_nodes;
        let kept: BTreeSet<&str> = all.into_iter().take(max_nodes).collect();

        let mut edges: Vec<(String, String)> = filtered_edges(data, edge_types)
            .filter(|(s, t)| kept.contains(s) && kept.contains(t))
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect();
        edges.sort();
        return Subgraph {
            nodes: kept.into_iter().map(String::from).collect(),
            edges,
            truncated,
        };
    };

    let mut forward: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut reverse: HashMap<&str, Vec<&str>> = HashMap::new();
    for (s, t) in filtered_edges(data, edge_types) {
        forward.entry(s).or_default().push(t);
        reverse.entry(t).or_default().push(s);
    }

    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut edges: BTreeSet<(String, String)> = BTreeSet::new();
    let mut truncated = false;
    let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(focus, 0)]);

    while let Some((current, d)) = queue.pop_front() {
        if seen.contains(current) {
            continue;
        }
        seen.insert(current.to_string());
        if seen.len() > max_nodes {
            truncated = true;
            break;
        }
        if d >= depth {
            continue;
        }

        if direction.outward() {
            for &neighbor in forward.get(current).map(Vec::as_slice).unwrap_or(&[]) {
                edges.insert((current.to_string(), neighbor.to_string()));
                if !seen.contains(neighbor) {
                    queue.push_back((neighbor, d + 1));
                }
            }
        }
        if direction.inward() {
            for &neighbor in reverse.get(current).map(Vec::as_slice).unwrap_or(&[]) {
                edges.insert((neighbor.to_string(), current.to_string()));
                if !seen.contains(neighbor) {
                    queue.push_back((neighbor, d + 1));
                }
            }
        }
    }

    Subgraph {
        nodes: seen.into_iter().collect(),
        edges: edges.into_iter().collect(),
        truncated,
    }
}

/// A display label for a node id: the id minus its kind prefix.
fn label_from_id(node_id: &str) -> &str {
    match node_id.split_once(':') {
        Some((prefix, rest)) if matches!(prefix, "func" | "class" | "file") => rest,
        _ => node_id,
    }
}

fn meta_for(
    subgraph: &Subgraph,
    focus: Option<&str>,
    direction: Direction,
    depth: usize,
    edge_types: &[EdgeKind],
    edges_rendered: usize,
) -> ExportMeta {
    let mut type_names: Vec<String> = edge_types.iter().map(|k| k.as_str().to_string()).collect();
    type_names.sort();
    ExportMeta {
        focus: focus.map(String::from),
        edge_types: type_names,
        direction: direction.as_str().to_string(),
        depth,
        nodes_rendered: subgraph.nodes.len(),
        edges_rendered,
        truncated: subgraph.truncated,
    }
}

/// Renders a Mermaid `graph TD` snippet of the subgraph around `focus`.
pub fn export_mermaid(
    data: &GraphData,
    focus: Option<&str>,
    direction: Direction,
    depth: usize,
    edge_types: Option<&[EdgeKind]>,
    max_nodes: usize,
) -> (String, ExportMeta) {
    let edge_types = edge_types.unwrap_or(DEFAULT_EDGE_TYPES);
    let subgraph = collect_subgraph(data, focus, direction, depth, edge_types, max_nodes);

    let index: HashMap<&str, usize> = subgraph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut lines = vec!["graph TD".to_string()];
    for id in &subgraph.nodes {
        lines.push(format!("  n{}[\"{}\"]", index[id.as_str()], label_from_id(id)));
    }

    let mut edges_rendered = 0;
    for (s, t) in &subgraph.edges {
        if let (Some(&si), Some(&ti)) = (index.get(s.as_str()), index.get(t.as_str())) {
            lines.push(format!("  n{} --> n{}", si, ti));
            edges_rendered += 1;
        }
    }

    let meta = meta_for(&subgraph, focus, direction, depth, edge_types, edges_rendered);
    (lines.join("\n"), meta)
}

/// Renders a Graphviz DOT digraph of the subgraph around `focus`.
pub fn export_dot(
    data: &GraphData,
    focus: Option<&str>,
    direction: Direction,
    depth: usize,
    edge_types: Option<&[EdgeKind]>,
    max_nodes: usize,
) -> (String, ExportMeta) {
    let edge_types = edge_types.unwrap_or(DEFAULT_EDGE_TYPES);
    let subgraph = collect_subgraph(data, focus, direction, depth, edge_types, max_nodes);

    let index: HashMap<&str, usize> = subgraph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut lines = vec!["digraph G {".to_string()];
    for id in &subgraph.nodes {
        let escaped = label_from_id(id).replace('"', "\\\"");
        lines.push(format!("  n{} [label=\"{}\"];", index[id.as_str()], escaped));
    }

    let mut edges_rendered = 0;
    for (s, t) in &subgraph.edges {
        if let (Some(&si), Some(&ti)) = (index.get(s.as_str()), index.get(t.as_str())) {
            lines.push(format!("  n{} -> n{};", si, ti));
            edges_rendered += 1;
        }
    }
    lines.push("}".to_string());

    let meta = meta_for(&subgraph, focus, direction, depth, edge_types, edges_rendered);
    (lines.join("\n"), meta)
}
