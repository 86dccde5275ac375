//! Structural queries: callers, callees, reachability, shortest path.

use std::collections::{BTreeSet, HashMap, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use common::{EdgeKind, GraphData};

/// Directed adjacency materialized over every edge type, with the node ids
/// kept alongside so traversal results map back to graph ids.
struct Adjacency<'a> {
    graph: DiGraph<(), ()>,
    ids: Vec<&'a str>,
    index: HashMap<&'a str, NodeIndex>,
}

impl<'a> Adjacency<'a> {
    fn new(data: &'a GraphData) -> Self {
        let mut graph = DiGraph::new();
        let mut ids = Vec::with_capacity(data.nodes.len());
        let mut index = HashMap::with_capacity(data.nodes.len());

        for node in &data.nodes {
            let idx = graph.add_node(());
            ids.push(node.id.as_str());
            index.insert(node.id.as_str(), idx);
        }
        for edge in &data.edges {
            if let (Some(&s), Some(&t)) = (
                index.get(edge.source.as_str()),
                index.get(edge.target.as_str()),
            ) {
                graph.add_edge(s, t, ());
            }
        }

        Adjacency { graph, ids, index }
    }

    /// Every node reachable from `seed` walking `direction`, excluding the
    /// seed itself. Sorted for deterministic output.
    fn reachable(&self, seed: &str, direction: Direction) -> Vec<String> {
        let Some(&start) = self.index.get(seed) else {
            return Vec::new();
        };

        let mut visited = vec![false; self.graph.node_count()];
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if visited[current.index()] {
                continue;
            }
            visited[current.index()] = true;
            for neighbor in self.graph.neighbors_directed(current, direction) {
                if !visited[neighbor.index()] {
                    stack.push(neighbor);
                }
            }
        }

        let mut result: Vec<String> = visited
            .iter()
            .enumerate()
            .filter(|(i, &seen)| seen && self.ids[*i] != seed)
            .map(|(i, _)| self.ids[i].to_string())
            .collect();
        result.sort();
        result
    }
}

/// Nodes with a `call` edge into `target_id`, sorted.
pub fn callers(data: &GraphData, target_id: &str) -> Vec<String> {
    let set: BTreeSet<&str> = data
        .edges
        .iter()
        .filter(|e| e.kind == EdgeKind::Call && e.target == target_id)
        .map(|e| e.source.as_str())
        .collect();
    set.into_iter().map(String::from).collect()
}

/// Nodes `source_id` has a `call` edge to, sorted.
pub fn callees(data: &GraphData, source_id: &str) -> Vec<String> {
    let set: BTreeSet<&str> = data
        .edges
        .iter()
        .filter(|e| e.kind == EdgeKind::Call && e.source == source_id)
        .map(|e| e.target.as_str())
        .collect();
    set.into_iter().map(String::from).collect()
}

/// Everything reachable from `node_id` along outgoing edges of any type.
pub fn dependencies(data: &GraphData, node_id: &str) -> Vec<String> {
    Adjacency::new(data).reachable(node_id, Direction::Outgoing)
}

/// Everything that can reach `node_id` along edges of any type.
pub fn reverse_dependencies(data: &GraphData, node_id: &str) -> Vec<String> {
    Adjacency::new(data).reachable(node_id, Direction::Incoming)
}

/// A shortest path from `source_id` to `target_id` over outgoing edges of
/// any type (BFS with parent reconstruction). Empty when unreachable.
pub fn path(data: &GraphData, source_id: &str, target_id: &str) -> Vec<String> {
    let adjacency = Adjacency::new(data);
    let (Some(&start), Some(&goal)) = (
        adjacency.index.get(source_id),
        adjacency.index.get(target_id),
    ) else {
        return Vec::new();
    };

    let mut parents: HashMap<NodeIndex, Option<NodeIndex>> = HashMap::new();
    parents.insert(start, None);
    let mut queue = VecDeque::from([start]);

    while let Some(current) = queue.pop_front() {
        if current == goal {
            break;
        }
        for neighbor in adjacency
            .graph
            .neighbors_directed(current, Direction::Outgoing)
        {
            if !parents.contains_key(&neighbor) {
                parents.insert(neighbor, Some(current));
                queue.push_back(neighbor);
            }
        }
    }

    if !parents.contains_key(&goal) {
        return Vec::new();
    }

    let mut result = Vec::new();
    let mut cursor = Some(goal);
    while let Some(idx) = cursor {
        result.push(adjacency.ids[idx.index()].to_string());
        cursor = parents[&idx];
    }
    result.reverse();
    result
}
