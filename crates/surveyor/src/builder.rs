//! # Graph Pipelines
//!
//! Two-pass function-granularity builder, the file-granularity alternate,
//! and the dispatching entry point. The index pass always completes before
//! any call edge is added, so node identity is stable while linking.

use std::path::Path;

use common::model::file_id;
use common::{EdgeKind, Graph, GraphData, Node};

use crate::aliases::{extract_aliases, imported_modules};
use crate::collect::{collect_nodes, ClassRegistry};
use crate::parser::{parse_files, ParserHost};
use crate::resolve::{link_calls, LinkContext, MethodIndex};
use crate::semantic::SemanticResolver;
use crate::{BuildOptions, Granularity, ResolveMode, SurveyorError};

/// Builds the full call-and-containment graph.
pub fn build_function_graph(
    root: &Path,
    options: &BuildOptions,
    engine: Option<&dyn SemanticResolver>,
) -> Result<GraphData, SurveyorError> {
    let root = dunce::canonicalize(root)?;
    let mut host = ParserHost::new()?;
    let index = parse_files(&root, &mut host)?;

    let mut graph = Graph::new();
    let mut registry = ClassRegistry::new();
    collect_nodes(&index, &mut graph, &mut registry);

    let methods = MethodIndex::from_graph(&graph);
    let use_semantic = options.resolve_calls == ResolveMode::Semantic;

    for (path, record) in &index {
        let tables = extract_aliases(record.tree.root_node(), record.source.as_bytes());
        let mut ctx = LinkContext {
            graph: &mut graph,
            registry: &registry,
            methods: &methods,
            engine,
            root: &root,
            include_external: options.include_external,
            use_semantic,
        };
        link_calls(path, record, &tables, &mut ctx);
    }

    tracing::debug!(
        files = index.len(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "function graph built"
    );
    Ok(graph.into_data())
}

/// Builds the file-granularity graph: one node per file, `import` edges for
/// imports that resolve to in-project files, no call edges.
pub fn build_file_graph(root: &Path) -> Result<GraphData, SurveyorError> {
    let root = dunce::canonicalize(root)?;
    let mut host = ParserHost::new()?;
    let index = parse_files(&root, &mut host)?;

    let mut graph = Graph::new();
    let mut module_to_file = std::collections::HashMap::new();

    for record in index.values() {
        if let Some(stem) = record.rel.strip_suffix(".py") {
            module_to_file.insert(stem.replace('/', "."), record.rel.clone());
        }
        graph.add_node(Node::file(&record.rel));
    }

    for record in index.values() {
        let source_id = file_id(&record.rel);
        for module in imported_modules(record.tree.root_node(), record.source.as_bytes()) {
            if let Some(target_rel) = module_to_file.get(&module) {
                graph.add_edge(source_id.clone(), file_id(target_rel), EdgeKind::Import);
            }
        }
    }

    tracing::debug!(
        files = index.len(),
        edges = graph.edge_count(),
        "file graph built"
    );
    Ok(graph.into_data())
}

/// Dispatches on granularity and returns the serialized graph value.
pub fn build_project_graph(
    root: &Path,
    options: &BuildOptions,
    engine: Option<&dyn SemanticResolver>,
) -> Result<GraphData, SurveyorError> {
    match options.granularity {
        Granularity::File => build_file_graph(root),
        Granularity::Function => build_function_graph(root, options, engine),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::ProjectInference;
    use common::Edge;
    use std::fs;
    use std::path::PathBuf;

    /// Writes the standard fixture tree used across the pipeline tests.
    fn write_fixture(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        fs::remove_dir_all(&tmp).ok();
        fs::create_dir_all(tmp.join("utils")).ok();

        fs::write(
            tmp.join("a.py"),
            concat!(
                "from utils.e import log\n",
                "\n",
                "\n",
                "def div(a, b):\n",
                "    return a / b\n",
                "\n",
                "\n",
                "class Divider:\n",
                "    def divide(self, a, b):\n",
                "        log(\"Divider.divide\")\n",
                "        return div(a, b)\n",
            ),
        )
        .ok();

        fs::write(
            tmp.join("b.py"),
            concat!(
                "import utils.e as e\n",
                "from utils.c import add as add_nums, multiply\n",
                "from utils.e import AuditLogger\n",
                "from a import Divider\n",
                "from utils.d import User\n",
                "\n",
                "\n",
                "def process(value):\n",
                "    e.log(\"b.process\")\n",
                "    x = add_nums(value, 7)\n",
                "    y = multiply(value, 3)\n",
                "    d = Divider()\n",
                "    out = d.divide(x, y)\n",
                "    AuditLogger().audit(\"process done\")\n",
                "    return out\n",
                "\n",
                "\n",
                "def entry():\n",
                "    User().login(\"b.entry\")\n",
                "    return process(5)\n",
            ),
        )
        .ok();

        fs::write(
            tmp.join("utils/c.py"),
            concat!(
                "from utils.e import log\n",
                "\n",
                "\n",
                "def add(a, b):\n",
                "    return a + b\n",
                "\n",
                "\n",
                "class Multiplier:\n",
                "    def mul(self, a, b):\n",
                "        log(\"Multiplier.mul\")\n",
                "        return a * b\n",
                "\n",
                "\n",
                "def multiply(a, b):\n",
                "    m = Multiplier()\n",
                "    return m.mul(a, b)\n",
            ),
        )
        .ok();

        fs::write(
            tmp.join("utils/d.py"),
            concat!(
                "from utils.e import log\n",
                "\n",
                "\n",
                "class User:\n",
                "    def login(self, source):\n",
                "        log(source)\n",
            ),
        )
        .ok();

        fs::write(
            tmp.join("utils/e.py"),
            concat!(
                "def log(msg):\n",
                "    print(msg)\n",
                "\n",
                "\n",
                "class AuditLogger:\n",
                "    def audit(self, msg):\n",
                "        log(msg)\n",
            ),
        )
        .ok();

        tmp
    }

    fn fallback_options() -> BuildOptions {
        BuildOptions {
            resolve_calls: ResolveMode::FallbackOnly,
            ..BuildOptions::default()
        }
    }

    fn has_edge(data: &GraphData, source: &str, target: &str, kind: EdgeKind) -> bool {
        data.edges
            .iter()
            .any(|e| e.source == source && e.target == target && e.kind == kind)
    }

    fn call_edges(data: &GraphData) -> Vec<&Edge> {
        data.edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Call)
            .collect()
    }

    #[test]
    fn test_alias_function_call_edge() {
        let tmp = write_fixture("test_builder_alias");
        let data = build_function_graph(&tmp, &fallback_options(), None).unwrap();

        assert!(has_edge(
            &data,
            "func:b.py:process",
            "func:utils/c.py:add",
            EdgeKind::Call
        ));

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_method_call_through_local_variable() {
        let tmp = write_fixture("test_builder_localvar");
        let data = build_function_graph(&tmp, &fallback_options(), None).unwrap();

        assert!(has_edge(
            &data,
            "func:b.py:process",
            "func:a.py:Divider.divide",
            EdgeKind::Call
        ));

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_chained_constructor_call() {
        let tmp = write_fixture("test_builder_chained");
        let data = build_function_graph(&tmp, &fallback_options(), None).unwrap();

        assert!(has_edge(
            &data,
            "func:b.py:process",
            "func:utils/e.py:AuditLogger.audit",
            EdgeKind::Call
        ));

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_method_to_free_function_with_engine() {
        let tmp = write_fixture("test_builder_engine");
        let engine = ProjectInference::new(dunce::canonicalize(&tmp).unwrap());
        let data =
            build_function_graph(&tmp, &BuildOptions::default(), Some(&engine)).unwrap();

        // Same-file call from a method body to a free function resolves only
        // through the semantic engine.
        assert!(has_edge(
            &data,
            "func:utils/e.py:AuditLogger.audit",
            "func:utils/e.py:log",
            EdgeKind::Call
        ));
        assert!(has_edge(
            &data,
            "func:b.py:entry",
            "func:b.py:process",
            EdgeKind::Call
        ));

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_engine_skipped_in_fallback_mode() {
        let tmp = write_fixture("test_builder_no_engine");
        let engine = ProjectInference::new(dunce::canonicalize(&tmp).unwrap());
        let data = build_function_graph(&tmp, &fallback_options(), Some(&engine)).unwrap();

        assert!(!has_edge(
            &data,
            "func:b.py:entry",
            "func:b.py:process",
            EdgeKind::Call
        ));

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_ambiguous_method_name_produces_no_edge() {
        let tmp = std::env::temp_dir().join("test_builder_ambiguous");
        fs::remove_dir_all(&tmp).ok();
        fs::create_dir_all(&tmp).ok();
        fs::write(
            tmp.join("x.py"),
            "class Worker:\n    def run(self):\n        pass\n",
        )
        .ok();
        fs::write(
            tmp.join("y.py"),
            "class Server:\n    def run(self):\n        pass\n",
        )
        .ok();
        fs::write(tmp.join("main.py"), "def go(obj):\n    obj.run()\n").ok();

        let data = build_function_graph(&tmp, &fallback_options(), None).unwrap();
        assert!(!call_edges(&data)
            .iter()
            .any(|e| e.source == "func:main.py:go"));

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_file_graph_import_edges() {
        let tmp = write_fixture("test_builder_filegraph");
        let data = build_file_graph(&tmp).unwrap();

        assert_eq!(data.nodes.len(), 5);
        assert!(data.nodes.iter().all(|n| n.type_tag() == "file"));
        assert!(has_edge(&data, "file:b.py", "file:utils/e.py", EdgeKind::Import));
        assert!(has_edge(&data, "file:b.py", "file:a.py", EdgeKind::Import));
        assert!(has_edge(
            &data,
            "file:utils/c.py",
            "file:utils/e.py",
            EdgeKind::Import
        ));
        assert!(call_edges(&data).is_empty());

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_granularity_dispatch() {
        let tmp = write_fixture("test_builder_dispatch");
        let options = BuildOptions {
            granularity: Granularity::File,
            ..fallback_options()
        };
        let data = build_project_graph(&tmp, &options, None).unwrap();
        assert!(data.nodes.iter().all(|n| n.type_tag() == "file"));

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_graph_invariants() {
        let tmp = write_fixture("test_builder_invariants");
        let engine = ProjectInference::new(dunce::canonicalize(&tmp).unwrap());
        let data =
            build_function_graph(&tmp, &BuildOptions::default(), Some(&engine)).unwrap();

        // Id uniqueness.
        let mut ids: Vec<&str> = data.nodes.iter().map(|n| n.id.as_str()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);

        // Edge referential integrity.
        for edge in &data.edges {
            assert!(data.has_node(&edge.source), "dangling source {}", edge.source);
            assert!(data.has_node(&edge.target), "dangling target {}", edge.target);
        }

        // Containment closure: every non-file node has an incoming contains
        // edge; methods have one from their file and one from their class.
        for node in &data.nodes {
            if node.type_tag() == "file" {
                continue;
            }
            let incoming: Vec<&Edge> = data
                .edges
                .iter()
                .filter(|e| e.kind == EdgeKind::Contains && e.target == node.id)
                .collect();
            assert!(!incoming.is_empty(), "uncontained node {}", node.id);
            if node.type_tag() == "method" {
                assert!(incoming.iter().any(|e| e.source.starts_with("file:")));
                assert!(incoming.iter().any(|e| e.source.starts_with("class:")));
            }
        }

        // Call endpoint typing and no self-containment.
        for edge in &data.edges {
            match edge.kind {
                EdgeKind::Call => {
                    assert!(edge.source.starts_with("func:"));
                    assert!(edge.target.starts_with("func:"));
                }
                EdgeKind::Contains => assert_ne!(edge.source, edge.target),
                EdgeKind::Import => {}
            }
        }

        // Edge-set semantics: no duplicate triples.
        let mut triples: Vec<(&str, &str, EdgeKind)> = data
            .edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str(), e.kind))
            .collect();
        let count = triples.len();
        triples.sort();
        triples.dedup();
        assert_eq!(triples.len(), count);

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let tmp = write_fixture("test_builder_deterministic");
        let first = build_function_graph(&tmp, &fallback_options(), None).unwrap();
        let second = build_function_graph(&tmp, &fallback_options(), None).unwrap();
        assert_eq!(first, second);

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_unparseable_file_contributes_nothing() {
        let tmp = std::env::temp_dir().join("test_builder_badfile");
        fs::remove_dir_all(&tmp).ok();
        fs::create_dir_all(&tmp).ok();
        fs::write(tmp.join("bad.py"), [0xff, 0xfe]).ok();
        fs::write(tmp.join("good.py"), "def fine():\n    pass\n").ok();

        let data = build_function_graph(&tmp, &fallback_options(), None).unwrap();
        assert!(data.has_node("func:good.py:fine"));
        assert!(data.nodes.iter().all(|n| !n.id.contains("bad.py")));

        fs::remove_dir_all(tmp).ok();
    }
}
