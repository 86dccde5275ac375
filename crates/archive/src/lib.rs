//! # The Archive: Keyed Cache of Built Graphs
//!
//! **Role**: Holds built graph values keyed by their build parameters, with
//! content-signature staleness detection and LRU eviction.
//!
//! **Contract**:
//! - A cache key is `(root, granularity, include_external, resolve_calls)`;
//!   each resident entry additionally carries an opaque `graph_id`.
//! - The signature is the sorted list of `(relpath, mtime, size)` for every
//!   source file under the root, using the same directory-exclusion rules as
//!   file discovery. Equal signatures mean the on-disk state has not changed.
//! - `refresh_if_stale` replaces signature and graph together; an entry is
//!   never observable half-updated.
//! - The cache itself is single-threaded state; multithreaded hosts wrap it
//!   in a mutex, which also serializes concurrent builds for the same key.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::Serialize;

use common::GraphData;
use surveyor::{discover, BuildOptions, Granularity, ResolveMode};

/// Ordered `(relpath, mtime_secs, size)` tuples over all in-scope sources.
pub type Signature = Vec<(String, i64, u64)>;

/// One resident cache entry.
#[derive(Debug, Clone)]
pub struct GraphEntry {
    pub graph_id: String,
    /// Canonical absolute analysis root.
    pub root: PathBuf,
    pub options: BuildOptions,
    pub signature: Signature,
    pub graph: GraphData,
}

/// Listing row exposed to user-facing shells.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheListing {
    pub graph_id: String,
    pub root: String,
    pub granularity: Granularity,
    pub include_external: bool,
    pub resolve_calls: ResolveMode,
    pub nodes: usize,
    pub edges: usize,
}

/// Outcome of a `clear` call.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClearOutcome {
    pub cleared: String,
    pub count: usize,
}

type CacheKey = (PathBuf, Granularity, bool, ResolveMode);

/// Computes the content signature of a root directory.
///
/// Files whose metadata cannot be read are skipped, mirroring discovery's
/// tolerance of transient I/O problems.
pub fn compute_signature(root: &Path) -> Signature {
    let root = dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let mut items: Signature = Vec::new();

    for path in discover::source_files(&root) {
        let Ok(metadata) = std::fs::metadata(&path) else {
            continue;
        };
        let Ok(rel) = common::relative_path(&root, &path) else {
            continue;
        };
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        items.push((rel, mtime, metadata.len()));
    }

    items.sort();
    items
}

/// LRU cache of built graphs.
pub struct GraphCache {
    max_entries: usize,
    by_id: HashMap<String, GraphEntry>,
    by_key: HashMap<CacheKey, String>,
    /// Front = most recently used.
    lru: VecDeque<String>,
}

impl GraphCache {
    /// Creates a cache bounded to `max_entries` resident graphs (at least 1).
    pub fn new(max_entries: usize) -> Self {
        GraphCache {
            max_entries: max_entries.max(1),
            by_id: HashMap::new(),
            by_key: HashMap::new(),
            lru: VecDeque::new(),
        }
    }

    fn key_of(root: &Path, options: &BuildOptions) -> CacheKey {
        (
            root.to_path_buf(),
            options.granularity,
            options.include_external,
            options.resolve_calls,
        )
    }

    fn touch_lru(&mut self, graph_id: &str) {
        self.lru.retain(|id| id != graph_id);
        self.lru.push_front(graph_id.to_string());

        while self.lru.len() > self.max_entries {
            if let Some(evicted) = self.lru.pop_back() {
                self.evict(&evicted);
            }
        }
    }

    fn evict(&mut self, graph_id: &str) {
        let Some(entry) = self.by_id.remove(graph_id) else {
            return;
        };
        let key = Self::key_of(&entry.root, &entry.options);
        // Only drop the key mapping if it still points at this id; a forced
        // rebuild may have re-pointed the key at a newer entry.
        if self.by_key.get(&key) == Some(&entry.graph_id) {
            self.by_key.remove(&key);
        }
        tracing::debug!(graph_id, "evicted cache entry");
    }

    /// Returns the cached entry for a key, or computes the signature, runs
    /// the builder, and installs a fresh entry. The boolean is `true` when
    /// the entry came from the cache.
    pub fn build_or_get<E>(
        &mut self,
        root: &Path,
        options: &BuildOptions,
        builder: &mut dyn FnMut(&Path, &BuildOptions) -> Result<GraphData, E>,
        force_rebuild: bool,
    ) -> Result<(&GraphEntry, bool), E> {
        let root = dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        let key = Self::key_of(&root, options);

        if !force_rebuild {
            if let Some(graph_id) = self.by_key.get(&key).cloned() {
                if self.by_id.contains_key(&graph_id) {
                    self.touch_lru(&graph_id);
                    let entry = self
                        .by_id
                        .get(&graph_id)
                        .expect("entry checked resident above");
                    return Ok((entry, true));
                }
            }
        }

        let signature = compute_signature(&root);
        let graph = builder(&root, options)?;

        let graph_id = uuid::Uuid::new_v4().to_string();
        let entry = GraphEntry {
            graph_id: graph_id.clone(),
            root,
            options: *options,
            signature,
            graph,
        };

        self.by_id.insert(graph_id.clone(), entry);
        self.by_key.insert(key, graph_id.clone());
        self.touch_lru(&graph_id);
        tracing::debug!(graph_id = %graph_id, "installed cache entry");

        let entry = self
            .by_id
            .get(&graph_id)
            .expect("entry installed above; capacity is at least 1");
        Ok((entry, false))
    }

    /// Looks up an entry by id, refreshing its LRU position.
    pub fn get(&mut self, graph_id: &str) -> Option<&GraphEntry> {
        if !self.by_id.contains_key(graph_id) {
            return None;
        }
        self.touch_lru(graph_id);
        self.by_id.get(graph_id)
    }

    /// Recomputes the entry's signature and rebuilds when it changed.
    ///
    /// Signature and graph are replaced together; the boolean is `true` when
    /// a rebuild happened. `Ok(None)` for unknown ids.
    pub fn refresh_if_stale<E>(
        &mut self,
        graph_id: &str,
        builder: &mut dyn FnMut(&Path, &BuildOptions) -> Result<GraphData, E>,
    ) -> Result<Option<(&GraphEntry, bool)>, E> {
        let (root, options, old_signature) = match self.by_id.get(graph_id) {
            Some(entry) => (entry.root.clone(), entry.options, entry.signature.clone()),
            None => return Ok(None),
        };

        let new_signature = compute_signature(&root);
        if new_signature == old_signature {
            self.touch_lru(graph_id);
            return Ok(Some((
                self.by_id.get(graph_id).expect("entry resident above"),
                false,
            )));
        }

        let graph = builder(&root, &options)?;

        let entry = self
            .by_id
            .get_mut(graph_id)
            .expect("entry resident above; no eviction since");
        entry.signature = new_signature;
        entry.graph = graph;
        self.touch_lru(graph_id);
        tracing::debug!(graph_id, "refreshed stale cache entry");

        Ok(Some((
            self.by_id.get(graph_id).expect("entry resident above"),
            true,
        )))
    }

    /// Listing of resident entries, most recently used first.
    pub fn list(&self) -> Vec<CacheListing> {
        self.lru
            .iter()
            .filter_map(|graph_id| self.by_id.get(graph_id))
            .map(|entry| CacheListing {
                graph_id: entry.graph_id.clone(),
                root: entry.root.to_string_lossy().replace('\\', "/"),
                granularity: entry.options.granularity,
                include_external: entry.options.include_external,
                resolve_calls: entry.options.resolve_calls,
                nodes: entry.graph.nodes.len(),
                edges: entry.graph.edges.len(),
            })
            .collect()
    }

    /// Clears everything (`None`) or a single entry by id.
    pub fn clear(&mut self, which: Option<&str>) -> ClearOutcome {
        match which {
            None => {
                let count = self.by_id.len();
                self.by_id.clear();
                self.by_key.clear();
                self.lru.clear();
                ClearOutcome {
                    cleared: "all".to_string(),
                    count,
                }
            }
            Some(graph_id) => {
                let count = if self.by_id.contains_key(graph_id) {
                    self.evict(graph_id);
                    self.lru.retain(|id| id != graph_id);
                    1
                } else {
                    0
                };
                ClearOutcome {
                    cleared: graph_id.to_string(),
                    count,
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Graph, Node};
    use std::fs;

    fn canned_graph(marker: &str) -> GraphData {
        let mut g = Graph::new();
        g.add_node(Node::function("m.py", marker));
        g.into_data()
    }

    /// Builder that returns a canned graph and counts invocations.
    fn counting_builder<'a>(
        marker: &'static str,
        calls: &'a std::cell::Cell<usize>,
    ) -> impl FnMut(&Path, &BuildOptions) -> Result<GraphData, std::convert::Infallible> + 'a {
        move |_, _| {
            calls.set(calls.get() + 1);
            Ok(canned_graph(marker))
        }
    }

    fn fixture(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        fs::remove_dir_all(&tmp).ok();
        fs::create_dir_all(&tmp).ok();
        fs::write(tmp.join("m.py"), "def f():\n    pass\n").ok();
        tmp
    }

    #[test]
    fn test_build_then_cached() {
        let tmp = fixture("test_archive_cached");
        let calls = std::cell::Cell::new(0);
        let mut cache = GraphCache::new(8);
        let options = BuildOptions::default();

        let mut builder = counting_builder("f", &calls);
        let (first_id, first_graph) = {
            let (entry, cached) = cache
                .build_or_get(&tmp, &options, &mut builder, false)
                .unwrap();
            assert!(!cached);
            (entry.graph_id.clone(), entry.graph.clone())
        };

        let (entry, cached) = cache
            .build_or_get(&tmp, &options, &mut builder, false)
            .unwrap();
        assert!(cached);
        assert_eq!(entry.graph_id, first_id);
        assert_eq!(entry.graph, first_graph);
        assert_eq!(calls.get(), 1);

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_distinct_options_are_distinct_keys() {
        let tmp = fixture("test_archive_keys");
        let calls = std::cell::Cell::new(0);
        let mut cache = GraphCache::new(8);
        let mut builder = counting_builder("f", &calls);

        let function_options = BuildOptions::default();
        let file_options = BuildOptions {
            granularity: Granularity::File,
            ..BuildOptions::default()
        };

        cache
            .build_or_get(&tmp, &function_options, &mut builder, false)
            .unwrap();
        cache
            .build_or_get(&tmp, &file_options, &mut builder, false)
            .unwrap();
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.len(), 2);

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_force_rebuild_mints_new_entry() {
        let tmp = fixture("test_archive_force");
        let calls = std::cell::Cell::new(0);
        let mut cache = GraphCache::new(8);
        let options = BuildOptions::default();
        let mut builder = counting_builder("f", &calls);

        let first_id = cache
            .build_or_get(&tmp, &options, &mut builder, false)
            .unwrap()
            .0
            .graph_id
            .clone();
        let (entry, cached) = cache
            .build_or_get(&tmp, &options, &mut builder, true)
            .unwrap();

        assert!(!cached);
        assert_ne!(entry.graph_id, first_id);
        assert_eq!(calls.get(), 2);

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_refresh_not_stale() {
        let tmp = fixture("test_archive_fresh");
        let calls = std::cell::Cell::new(0);
        let mut cache = GraphCache::new(8);
        let mut builder = counting_builder("f", &calls);

        let graph_id = cache
            .build_or_get(&tmp, &BuildOptions::default(), &mut builder, false)
            .unwrap()
            .0
            .graph_id
            .clone();

        let (_, refreshed) = cache
            .refresh_if_stale(&graph_id, &mut builder)
            .unwrap()
            .unwrap();
        assert!(!refreshed);
        assert_eq!(calls.get(), 1);

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_refresh_detects_content_change() {
        let tmp = fixture("test_archive_stale");
        let calls = std::cell::Cell::new(0);
        let mut cache = GraphCache::new(8);
        let mut builder = counting_builder("f", &calls);

        let graph_id = cache
            .build_or_get(&tmp, &BuildOptions::default(), &mut builder, false)
            .unwrap()
            .0
            .graph_id
            .clone();

        // Content change alters the file size, which the signature tracks.
        fs::write(tmp.join("m.py"), "def f():\n    pass\n\ndef g():\n    pass\n").ok();

        let (entry, refreshed) = cache
            .refresh_if_stale(&graph_id, &mut builder)
            .unwrap()
            .unwrap();
        assert!(refreshed);
        assert_eq!(entry.graph_id, graph_id);
        assert_eq!(calls.get(), 2);

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_refresh_detects_added_and_removed_files() {
        let tmp = fixture("test_archive_addrm");
        let calls = std::cell::Cell::new(0);
        let mut cache = GraphCache::new(8);
        let mut builder = counting_builder("f", &calls);

        let graph_id = cache
            .build_or_get(&tmp, &BuildOptions::default(), &mut builder, false)
            .unwrap()
            .0
            .graph_id
            .clone();

        fs::write(tmp.join("extra.py"), "x = 1\n").ok();
        let (_, refreshed) = cache
            .refresh_if_stale(&graph_id, &mut builder)
            .unwrap()
            .unwrap();
        assert!(refreshed);

        fs::remove_file(tmp.join("extra.py")).ok();
        let (_, refreshed) = cache
            .refresh_if_stale(&graph_id, &mut builder)
            .unwrap()
            .unwrap();
        assert!(refreshed);

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_refresh_unknown_id() {
        let mut cache = GraphCache::new(8);
        let mut builder =
            |_: &Path, _: &BuildOptions| -> Result<GraphData, std::convert::Infallible> {
                Ok(canned_graph("x"))
            };
        assert!(cache
            .refresh_if_stale("no-such-id", &mut builder)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_lru_eviction_drops_oldest() {
        let a = fixture("test_archive_lru_a");
        let b = fixture("test_archive_lru_b");
        let c = fixture("test_archive_lru_c");
        let calls = std::cell::Cell::new(0);
        let mut cache = GraphCache::new(2);
        let options = BuildOptions::default();
        let mut builder = counting_builder("f", &calls);

        let id_a = cache
            .build_or_get(&a, &options, &mut builder, false)
            .unwrap()
            .0
            .graph_id
            .clone();
        cache.build_or_get(&b, &options, &mut builder, false).unwrap();
        cache.build_or_get(&c, &options, &mut builder, false).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&id_a).is_none());
        // The evicted key builds fresh again, not from cache.
        let (_, cached) = cache
            .build_or_get(&a, &options, &mut builder, false)
            .unwrap();
        assert!(!cached);

        for tmp in [a, b, c] {
            fs::remove_dir_all(tmp).ok();
        }
    }

    #[test]
    fn test_clear_all_and_single() {
        let tmp = fixture("test_archive_clear");
        let calls = std::cell::Cell::new(0);
        let mut cache = GraphCache::new(8);
        let mut builder = counting_builder("f", &calls);

        let graph_id = cache
            .build_or_get(&tmp, &BuildOptions::default(), &mut builder, false)
            .unwrap()
            .0
            .graph_id
            .clone();

        let outcome = cache.clear(Some("missing"));
        assert_eq!(outcome.count, 0);

        let outcome = cache.clear(Some(&graph_id));
        assert_eq!(outcome.count, 1);
        assert!(cache.is_empty());

        cache
            .build_or_get(&tmp, &BuildOptions::default(), &mut builder, false)
            .unwrap();
        let outcome = cache.clear(None);
        assert_eq!(outcome.cleared, "all");
        assert_eq!(outcome.count, 1);
        assert!(cache.list().is_empty());

        fs::remove_dir_all(tmp).ok();
    }

    #[test]
    fn test_list_shape_and_order() {
        let a = fixture("test_archive_list_a");
        let b = fixture("test_archive_list_b");
        let calls = std::cell::Cell::new(0);
        let mut cache = GraphCache::new(8);
        let options = BuildOptions::default();
        let mut builder = counting_builder("f", &calls);

        let id_a = cache
            .build_or_get(&a, &options, &mut builder, false)
            .unwrap()
            .0
            .graph_id
            .clone();
        let id_b = cache
            .build_or_get(&b, &options, &mut builder, false)
            .unwrap()
            .0
            .graph_id
            .clone();

        let listing = cache.list();
        assert_eq!(listing.len(), 2);
        // Most recently used first.
        assert_eq!(listing[0].graph_id, id_b);
        assert_eq!(listing[1].graph_id, id_a);
        assert_eq!(listing[0].nodes, 1);
        assert_eq!(listing[0].edges, 0);

        // Touching A moves it to the front.
        cache.get(&id_a);
        assert_eq!(cache.list()[0].graph_id, id_a);

        for tmp in [a, b] {
            fs::remove_dir_all(tmp).ok();
        }
    }

    #[test]
    fn test_signature_ignores_excluded_dirs() {
        let tmp = fixture("test_archive_sig_excl");
        fs::create_dir_all(tmp.join("__pycache__")).ok();
        fs::write(tmp.join("__pycache__/junk.py"), "x = 1\n").ok();

        let signature = compute_signature(&tmp);
        assert_eq!(signature.len(), 1);
        assert_eq!(signature[0].0, "m.py");

        fs::remove_dir_all(tmp).ok();
    }
}
