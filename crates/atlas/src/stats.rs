//! Fan-in/fan-out statistics over a single edge type.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use common::{EdgeKind, GraphData, Node};

/// Totals reported with every overview.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OverviewCounts {
    pub nodes_total: usize,
    pub edges_total: usize,
    pub edges_of_type: usize,
    pub nodes_involved_in_edges: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HotspotEntry {
    pub node: String,
    pub fanin: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HubEntry {
    pub node: String,
    pub fanout: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileCounts {
    pub file: String,
    pub functions: usize,
    pub methods: usize,
    pub classes: usize,
}

/// Degree statistics for one edge type plus per-file definition counts.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GraphOverview {
    pub edge_type: String,
    pub counts: OverviewCounts,
    pub entrypoints: Vec<String>,
    pub leaves: Vec<String>,
    pub top_hotspots_by_fanin: Vec<HotspotEntry>,
    pub top_hubs_by_fanout: Vec<HubEntry>,
    pub per_file: Vec<FileCounts>,
}

/// Human label for a node id: the file path for file nodes, otherwise
/// `file:qualname`.
fn label(nodes_by_id: &HashMap<&str, &Node>, id: &str) -> String {
    match nodes_by_id.get(id) {
        Some(node) => match node.qualname() {
            Some(qualname) => format!("{}:{}", node.file_rel(), qualname),
            None => node.file_rel().to_string(),
        },
        None => id.to_string(),
    }
}

/// Computes the overview for `edge_type` (`call` being the interesting one).
///
/// Entry points have in-degree 0 and out-degree > 0; leaves the converse.
/// Hotspots/hubs are the top `top_n` by fan-in/fan-out, ties broken by node
/// id so the output is deterministic.
pub fn overview(data: &GraphData, edge_type: EdgeKind, top_n: usize) -> GraphOverview {
    let nodes_by_id: HashMap<&str, &Node> =
        data.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    let mut indegree: HashMap<&str, usize> = HashMap::new();
    let mut outdegree: HashMap<&str, usize> = HashMap::new();
    let mut edges_of_type = 0usize;

    for edge in &data.edges {
        if edge.kind != edge_type {
            continue;
        }
        edges_of_type += 1;
        *outdegree.entry(edge.source.as_str()).or_default() += 1;
        *indegree.entry(edge.target.as_str()).or_default() += 1;
    }

    let involved: BTreeSet<&str> = indegree
        .keys()
        .chain(outdegree.keys())
        .copied()
        .collect();

    let fanin = |id: &str| indegree.get(id).copied().unwrap_or(0);
    let fanout = |id: &str| outdegree.get(id).copied().unwrap_or(0);

    let entrypoints: Vec<&str> = involved
        .iter()
        .filter(|id| fanin(id) == 0 && fanout(id) > 0)
        .copied()
        .collect();
    let leaves: Vec<&str> = involved
        .iter()
        .filter(|id| fanout(id) == 0 && fanin(id) > 0)
        .copied()
        .collect();

    let mut by_fanin: Vec<&str> = involved.iter().copied().collect();
    by_fanin.sort_by(|a, b| fanin(b).cmp(&fanin(a)).then(a.cmp(b)));
    let mut by_fanout: Vec<&str> = involved.iter().copied().collect();
    by_fanout.sort_by(|a, b| fanout(b).cmp(&fanout(a)).then(a.cmp(b)));

    let mut per_file: HashMap<&str, FileCounts> = HashMap::new();
    for node in &data.nodes {
        let file = node.file_rel();
        let entry = per_file.entry(file).or_insert_with(|| FileCounts {
            file: file.to_string(),
            functions: 0,
            methods: 0,
            classes: 0,
        });
        match node.type_tag() {
            "function" => entry.functions += 1,
            "method" => entry.methods += 1,
            "class" => entry.classes += 1,
            _ => {}
        }
    }
    let mut per_file: Vec<FileCounts> = per_file.into_values().collect();
    per_file.sort_by(|a, b| {
        let total_a = a.functions + a.methods + a.classes;
        let total_b = b.functions + b.methods + b.classes;
        total_b.cmp(&total_a).then(a.file.cmp(&b.file))
    });
    per_file.truncate(top_n);

    GraphOverview {
        edge_type: edge_type.as_str().to_string(),
        counts: OverviewCounts {
            nodes_total: data.nodes.len(),
            edges_total: data.edges.len(),
            edges_of_type,
            nodes_involved_in_edges: involved.len(),
        },
        entrypoints: entrypoints
            .iter()
            .take(top_n)
            .map(|id| label(&nodes_by_id, id))
            .collect(),
        leaves: leaves
            .iter()
            .take(top_n)
            .map(|id| label(&nodes_by_id, id))
            .collect(),
        top_hotspots_by_fanin: by_fanin
            .iter()
            .take(top_n)
            .map(|id| HotspotEntry {
                node: label(&nodes_by_id, id),
                fanin: fanin(id),
            })
            .collect(),
        top_hubs_by_fanout: by_fanout
            .iter()
            .take(top_n)
            .map(|id| HubEntry {
                node: label(&nodes_by_id, id),
                fanout: fanout(id),
            })
            .collect(),
        per_file,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Graph;

    fn sample() -> GraphData {
        let mut g = Graph::new();
        g.add_node(Node::file("b.py"));
        g.add_node(Node::function("b.py", "entry"));
        g.add_node(Node::function("b.py", "process"));
        g.add_node(Node::class("a.py", "Divider"));
        g.add_node(Node::method("a.py", "Divider", "divide"));
        g.add_node(Node::function("utils/e.py", "log"));

        g.add_edge("file:b.py", "func:b.py:entry", EdgeKind::Contains);
        g.add_edge("func:b.py:entry", "func:b.py:process", EdgeKind::Call);
        g.add_edge("func:b.py:process", "func:a.py:Divider.divide", EdgeKind::Call);
        g.add_edge("func:b.py:process", "func:utils/e.py:log", EdgeKind::Call);
        g.add_edge("func:a.py:Divider.divide", "func:utils/e.py:log", EdgeKind::Call);
        g.into_data()
    }

    #[test]
    fn test_counts() {
        let data = sample();
        let ov = overview(&data, EdgeKind::Call, 10);

        assert_eq!(ov.edge_type, "call");
        assert_eq!(ov.counts.nodes_total, 6);
        assert_eq!(ov.counts.edges_total, 5);
        assert_eq!(ov.counts.edges_of_type, 4);
        assert_eq!(ov.counts.nodes_involved_in_edges, 4);
    }

    #[test]
    fn test_entrypoints_and_leaves() {
        let data = sample();
        let ov = overview(&data, EdgeKind::Call, 10);

        assert_eq!(ov.entrypoints, vec!["b.py:entry"]);
        assert_eq!(ov.leaves, vec!["utils/e.py:log"]);
    }

    #[test]
    fn test_hotspots_ranked_by_fanin() {
        let data = sample();
        let ov = overview(&data, EdgeKind::Call, 2);

        assert_eq!(ov.top_hotspots_by_fanin[0].node, "utils/e.py:log");
        assert_eq!(ov.top_hotspots_by_fanin[0].fanin, 2);
        assert_eq!(ov.top_hotspots_by_fanin.len(), 2);
    }

    #[test]
    fn test_hubs_ranked_by_fanout() {
        let data = sample();
        let ov = overview(&data, EdgeKind::Call, 10);

        assert_eq!(ov.top_hubs_by_fanout[0].node, "b.py:process");
        assert_eq!(ov.top_hubs_by_fanout[0].fanout, 2);
    }

    #[test]
    fn test_per_file_counts() {
        let data = sample();
        let ov = overview(&data, EdgeKind::Call, 10);

        let b = ov.per_file.iter().find(|f| f.file == "b.py").unwrap();
        assert_eq!(b.functions, 2);
        assert_eq!(b.methods, 0);
        let a = ov.per_file.iter().find(|f| f.file == "a.py").unwrap();
        assert_eq!(a.classes, 1);
        assert_eq!(a.methods, 1);
    }

    #[test]
    fn test_contains_overview_differs() {
        let data = sample();
        let ov = overview(&data, EdgeKind::Contains, 10);
        assert_eq!(ov.counts.edges_of_type, 1);
    }
}
