//! Coercion of user-friendly node references to canonical ids.

use common::GraphData;

/// Resolves a node reference to a canonical id.
///
/// Accepted shapes, tried in order:
/// - an exact id (`func:b.py:process`);
/// - an already-prefixed id that does not exist → `None`, no guessing;
/// - a bare relpath ending in `.py` → the file id;
/// - `relpath:symbol` → `func:` first, then `class:`;
/// - anything else → the first node id ending with the reference.
pub fn resolve_node_id(data: &GraphData, reference: &str) -> Option<String> {
    if reference.is_empty() {
        return None;
    }

    if data.has_node(reference) {
        return Some(reference.to_string());
    }

    if reference.starts_with("func:")
        || reference.starts_with("file:")
        || reference.starts_with("class:")
    {
        return None;
    }

    if reference.ends_with(".py") && !reference.contains(".py:") {
        let candidate = format!("file:{}", reference);
        return data.has_node(&candidate).then_some(candidate);
    }

    if reference.contains(".py:") {
        let candidate = format!("func:{}", reference);
        if data.has_node(&candidate) {
            return Some(candidate);
        }
        let candidate = format!("class:{}", reference);
        if data.has_node(&candidate) {
            return Some(candidate);
        }
    }

    data.nodes
        .iter()
        .map(|n| n.id.as_str())
        .find(|id| id.ends_with(reference))
        .map(String::from)
}

/// Up to `limit` node ids containing `needle`, in graph order.
pub fn suggest_nodes(data: &GraphData, needle: &str, limit: usize) -> Vec<String> {
    data.nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| id.contains(needle))
        .take(limit)
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Graph, Node};

    fn sample() -> GraphData {
        let mut g = Graph::new();
        g.add_node(Node::file("b.py"));
        g.add_node(Node::class("a.py", "Divider"));
        g.add_node(Node::function("b.py", "process"));
        g.add_node(Node::method("a.py", "Divider", "divide"));
        g.into_data()
    }

    #[test]
    fn test_exact_id() {
        let data = sample();
        assert_eq!(
            resolve_node_id(&data, "func:b.py:process").unwrap(),
            "func:b.py:process"
        );
    }

    #[test]
    fn test_prefixed_but_unknown_returns_none() {
        let data = sample();
        assert!(resolve_node_id(&data, "func:b.py:missing").is_none());
    }

    #[test]
    fn test_bare_file_path() {
        let data = sample();
        assert_eq!(resolve_node_id(&data, "b.py").unwrap(), "file:b.py");
        assert!(resolve_node_id(&data, "zzz.py").is_none());
    }

    #[test]
    fn test_relpath_symbol_tries_func_then_class() {
        let data = sample();
        assert_eq!(
            resolve_node_id(&data, "b.py:process").unwrap(),
            "func:b.py:process"
        );
        assert_eq!(
            resolve_node_id(&data, "a.py:Divider").unwrap(),
            "class:a.py:Divider"
        );
    }

    #[test]
    fn test_suffix_match() {
        let data = sample();
        assert_eq!(
            resolve_node_id(&data, "Divider.divide").unwrap(),
            "func:a.py:Divider.divide"
        );
        assert!(resolve_node_id(&data, "nonexistent").is_none());
    }

    #[test]
    fn test_suggestions_limited() {
        let data = sample();
        let hits = suggest_nodes(&data, "Divider", 1);
        assert_eq!(hits.len(), 1);
        let all = suggest_nodes(&data, "Divider", 10);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_empty_reference() {
        let data = sample();
        assert!(resolve_node_id(&data, "").is_none());
    }
}
