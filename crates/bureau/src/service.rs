//! The graph service: structured entry points over builder, cache, and
//! queries.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use archive::{CacheListing, ClearOutcome, GraphCache, GraphEntry};
use atlas::stats::GraphOverview;
use atlas::viz::{Direction, ExportMeta, DEFAULT_MAX_NODES};
use common::{EdgeKind, GraphData, Node};
use surveyor::{
    build_project_graph, BuildOptions, Granularity, ProjectInference, ResolveMode,
    SemanticResolver, SurveyorError,
};

use crate::inputs::{normalize_resolve_mode, reject_control_chars, QueryType};

const SUGGESTION_LIMIT: usize = 12;
const OVERVIEW_TOP_N: usize = 10;

/// Serializable failure object: the only error shape the service emits.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Failure {
    pub fn new(error: impl Into<String>) -> Self {
        Failure {
            error: error.into(),
            suggestions: Vec::new(),
            hint: None,
        }
    }

    fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    fn unknown_graph(graph_id: &str) -> Self {
        Failure::new(format!("Unknown graph id: {}", graph_id))
            .with_hint("Build a graph first and use the returned graph_id.")
    }

    fn build_failed(error: SurveyorError) -> Self {
        Failure::new(format!("Build failed: {}", error))
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.error)
    }
}

/// Parameters of a build request, as received from a shell.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub root_path: String,
    pub granularity: String,
    pub include_external: bool,
    pub resolve_calls: String,
    pub force_rebuild: bool,
    pub return_graph: bool,
}

impl BuildRequest {
    pub fn new(root_path: impl Into<String>) -> Self {
        BuildRequest {
            root_path: root_path.into(),
            granularity: "function".to_string(),
            include_external: false,
            resolve_calls: "semantic".to_string(),
            force_rebuild: false,
            return_graph: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReply {
    pub graph_id: String,
    pub cached: bool,
    pub root: String,
    pub granularity: Granularity,
    pub include_external: bool,
    pub resolve_calls: ResolveMode,
    pub summary: GraphSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<GraphData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverviewReply {
    pub graph_id: String,
    pub refreshed: bool,
    pub overview: GraphOverview,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchReply {
    pub graph_id: String,
    pub refreshed: bool,
    pub matches: Vec<String>,
    pub hint: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryReply {
    pub graph_id: String,
    pub refreshed: bool,
    pub target_resolved: String,
    pub result: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportReply {
    pub graph_id: String,
    pub refreshed: bool,
    pub format: String,
    pub text: String,
    pub meta: ExportMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct CertaintyReply {
    pub graph_id: String,
    pub refreshed: bool,
    pub target_resolved: String,
    pub callees: Vec<String>,
    pub classification: CallClassification,
}

/// How certain a call from the target to a callee is, as judged by an
/// external classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Certainty {
    Always,
    Conditional,
    Unlikely,
    Unknown,
}

/// Classifier verdicts keyed by callee id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallClassification {
    pub verdicts: BTreeMap<String, Certainty>,
}

/// Everything a classifier needs: the analysis root (for reading source),
/// the resolved target node, and its graph-derived callee list.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyRequest {
    pub root: PathBuf,
    pub target_id: String,
    pub target: Node,
    pub callees: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier transport failed: {0}")]
    Transport(String),
    #[error("classifier returned malformed output: {0}")]
    Malformed(String),
}

/// Black-box call-certainty classifier collaborator.
pub trait CallClassifier {
    fn classify(&self, request: &ClassifyRequest) -> Result<CallClassification, ClassifierError>;
}

/// The service every shell talks to. All cache access is serialized behind
/// one mutex, so cache operations appear atomic and concurrent builds of
/// the same key execute once.
pub struct GraphService {
    cache: Mutex<GraphCache>,
    engine: Option<Arc<dyn SemanticResolver + Send + Sync>>,
}

fn run_build(
    engine: Option<&(dyn SemanticResolver + Send + Sync)>,
    root: &Path,
    options: &BuildOptions,
) -> Result<GraphData, SurveyorError> {
    match engine {
        Some(engine) => {
            let engine: &dyn SemanticResolver = engine;
            build_project_graph(root, options, Some(engine))
        }
        None => {
            // No injected engine: a per-build project-scoped one.
            let local = ProjectInference::new(root);
            build_project_graph(root, options, Some(&local))
        }
    }
}

impl GraphService {
    /// Service with the built-in per-build inference engine.
    pub fn new(max_cache_entries: usize) -> Self {
        GraphService {
            cache: Mutex::new(GraphCache::new(max_cache_entries)),
            engine: None,
        }
    }

    /// Service with an injected semantic engine shared across builds.
    pub fn with_engine(
        max_cache_entries: usize,
        engine: Arc<dyn SemanticResolver + Send + Sync>,
    ) -> Self {
        GraphService {
            cache: Mutex::new(GraphCache::new(max_cache_entries)),
            engine: Some(engine),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GraphCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builds (or fetches) a graph and reports its identity and size.
    pub fn build_graph(&self, request: &BuildRequest) -> Result<BuildReply, Failure> {
        if let Some(message) = reject_control_chars(&request.root_path) {
            return Err(Failure::new(message));
        }
        let root = Path::new(&request.root_path);
        if !root.is_dir() {
            return Err(Failure::new(format!(
                "Root path does not exist or is not a directory: {}",
                request.root_path
            )));
        }

        let options = BuildOptions {
            granularity: Granularity::parse(&request.granularity),
            include_external: request.include_external,
            resolve_calls: normalize_resolve_mode(&request.resolve_calls),
        };

        let engine = self.engine.as_deref();
        let mut builder =
            |root: &Path, options: &BuildOptions| run_build(engine, root, options);

        let mut cache = self.lock();
        let (entry, cached) = cache
            .build_or_get(root, &options, &mut builder, request.force_rebuild)
            .map_err(Failure::build_failed)?;
        tracing::debug!(graph_id = %entry.graph_id, cached, "graph build served");

        Ok(BuildReply {
            graph_id: entry.graph_id.clone(),
            cached,
            root: entry.root.to_string_lossy().replace('\\', "/"),
            granularity: entry.options.granularity,
            include_external: entry.options.include_external,
            resolve_calls: entry.options.resolve_calls,
            summary: GraphSummary {
                nodes: entry.graph.nodes.len(),
                edges: entry.graph.edges.len(),
            },
            graph: request.return_graph.then(|| entry.graph.clone()),
        })
    }

    /// Runs `f` against a resident entry, refreshing it first when asked.
    fn with_entry<T>(
        &self,
        graph_id: &str,
        refresh_if_stale: bool,
        f: impl FnOnce(&GraphEntry, bool) -> Result<T, Failure>,
    ) -> Result<T, Failure> {
        let engine = self.engine.as_deref();
        let mut builder =
            |root: &Path, options: &BuildOptions| run_build(engine, root, options);

        let mut cache = self.lock();
        if refresh_if_stale {
            match cache.refresh_if_stale(graph_id, &mut builder) {
                Ok(Some((entry, refreshed))) => f(entry, refreshed),
                Ok(None) => Err(Failure::unknown_graph(graph_id)),
                Err(error) => Err(Failure::build_failed(error)),
            }
        } else {
            match cache.get(graph_id) {
                Some(entry) => f(entry, false),
                None => Err(Failure::unknown_graph(graph_id)),
            }
        }
    }

    /// Resident entries, most recently used first.
    pub fn list_graphs(&self) -> Vec<CacheListing> {
        self.lock().list()
    }

    /// Clears the whole cache (`None`) or a single entry.
    pub fn clear_cache(&self, graph_id: Option<&str>) -> ClearOutcome {
        self.lock().clear(graph_id)
    }

    /// Degree statistics over `call` edges.
    pub fn overview(
        &self,
        graph_id: &str,
        refresh_if_stale: bool,
    ) -> Result<OverviewReply, Failure> {
        self.with_entry(graph_id, refresh_if_stale, |entry, refreshed| {
            Ok(OverviewReply {
                graph_id: graph_id.to_string(),
                refreshed,
                overview: atlas::overview(&entry.graph, EdgeKind::Call, OVERVIEW_TOP_N),
            })
        })
    }

    /// Substring search over node ids.
    pub fn search_nodes(
        &self,
        graph_id: &str,
        query: &str,
        limit: usize,
        refresh_if_stale: bool,
    ) -> Result<SearchReply, Failure> {
        self.with_entry(graph_id, refresh_if_stale, |entry, refreshed| {
            Ok(SearchReply {
                graph_id: graph_id.to_string(),
                refreshed,
                matches: atlas::suggest_nodes(&entry.graph, query, limit),
                hint: "Use returned ids as target/focus (e.g. \"func:b.py:process\").".to_string(),
            })
        })
    }

    /// Structural query dispatch.
    pub fn query_graph(
        &self,
        graph_id: &str,
        query_type: &str,
        target: &str,
        path_target: Option<&str>,
        refresh_if_stale: bool,
    ) -> Result<QueryReply, Failure> {
        let Some(query) = QueryType::parse(query_type) else {
            return Err(Failure::new(format!("Unknown query_type: {}", query_type))
                .with_suggestions(
                    QueryType::ALLOWED.iter().map(|s| s.to_string()).collect(),
                ));
        };

        self.with_entry(graph_id, refresh_if_stale, |entry, refreshed| {
            let graph = &entry.graph;
            let resolved = atlas::resolve_node_id(graph, target).ok_or_else(|| {
                Failure::new(format!("Unknown target node id: {}", target))
                    .with_suggestions(atlas::suggest_nodes(graph, target, SUGGESTION_LIMIT))
                    .with_hint("Try \"func:b.py:process\" or search_nodes first.")
            })?;

            let result = match query {
                QueryType::Callers => atlas::callers(graph, &resolved),
                QueryType::Callees => atlas::callees(graph, &resolved),
                QueryType::Dependencies => atlas::dependencies(graph, &resolved),
                QueryType::ReverseDependencies => atlas::reverse_dependencies(graph, &resolved),
                QueryType::Path => {
                    let Some(path_target) = path_target else {
                        return Err(Failure::new("query_type=path requires path_target"));
                    };
                    let resolved_path_target = atlas::resolve_node_id(graph, path_target)
                        .ok_or_else(|| {
                            Failure::new(format!("Unknown path_target node id: {}", path_target))
                                .with_suggestions(atlas::suggest_nodes(
                                    graph,
                                    path_target,
                                    SUGGESTION_LIMIT,
                                ))
                        })?;
                    atlas::path(graph, &resolved, &resolved_path_target)
                }
            };

            Ok(QueryReply {
                graph_id: graph_id.to_string(),
                refreshed,
                target_resolved: resolved,
                result,
            })
        })
    }

    /// Focused subgraph export as Mermaid or DOT.
    pub fn export_graph(
        &self,
        graph_id: &str,
        format: &str,
        focus: Option<&str>,
        direction: &str,
        depth: usize,
        refresh_if_stale: bool,
    ) -> Result<ExportReply, Failure> {
        self.with_entry(graph_id, refresh_if_stale, |entry, refreshed| {
            let graph = &entry.graph;

            let resolved_focus = match focus {
                Some(reference) => Some(atlas::resolve_node_id(graph, reference).ok_or_else(
                    || {
                        Failure::new(format!("Unknown focus node id: {}", reference))
                            .with_suggestions(atlas::suggest_nodes(
                                graph,
                                reference,
                                SUGGESTION_LIMIT,
                            ))
                            .with_hint("Try \"func:b.py:process\" (note the func: prefix).")
                    },
                )?),
                None => None,
            };

            let direction = Direction::parse(direction);
            let (format_name, text, meta) = if format.trim().eq_ignore_ascii_case("dot") {
                let (text, meta) = atlas::export_dot(
                    graph,
                    resolved_focus.as_deref(),
                    direction,
                    depth,
                    None,
                    DEFAULT_MAX_NODES,
                );
                ("dot", text, meta)
            } else {
                let (text, meta) = atlas::export_mermaid(
                    graph,
                    resolved_focus.as_deref(),
                    direction,
                    depth,
                    None,
                    DEFAULT_MAX_NODES,
                );
                ("mermaid", text, meta)
            };

            Ok(ExportReply {
                graph_id: graph_id.to_string(),
                refreshed,
                format: format_name.to_string(),
                text,
                meta,
            })
        })
    }

    /// Gathers a target's callee list and hands both to a classifier
    /// collaborator. Classifier failures surface as structured failures and
    /// leave graph and cache untouched.
    pub fn call_certainty(
        &self,
        graph_id: &str,
        target: &str,
        classifier: &dyn CallClassifier,
        refresh_if_stale: bool,
    ) -> Result<CertaintyReply, Failure> {
        self.with_entry(graph_id, refresh_if_stale, |entry, refreshed| {
            let graph = &entry.graph;
            let resolved = atlas::resolve_node_id(graph, target).ok_or_else(|| {
                Failure::new(format!("Unknown target node id: {}", target))
                    .with_suggestions(atlas::suggest_nodes(graph, target, SUGGESTION_LIMIT))
            })?;
            let target_node = graph
                .node(&resolved)
                .ok_or_else(|| {
                    Failure::new(format!("Target node not found in graph: {}", resolved))
                })?
                .clone();

            let callees = atlas::callees(graph, &resolved);
            let request = ClassifyRequest {
                root: entry.root.clone(),
                target_id: resolved.clone(),
                target: target_node,
                callees: callees.clone(),
            };

            let classification = classifier
                .classify(&request)
                .map_err(|e| Failure::new(format!("Call classification failed: {}", e)))?;

            Ok(CertaintyReply {
                graph_id: graph_id.to_string(),
                refreshed,
                target_resolved: resolved,
                callees,
                classification,
            })
        })
    }
}
