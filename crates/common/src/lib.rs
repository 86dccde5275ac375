//! # Common: The Graph Value Object
//!
//! **Role**: Shared vocabulary for every other crate — typed nodes and edges,
//! the serialized `{nodes, edges}` graph value, and path normalization.
//!
//! **Core Types**:
//! - `Node` / `NodeKind`: tagged node variants (file, class, function, method)
//!   sharing a string id.
//! - `Edge` / `EdgeKind`: directed `(source, target, type)` triples.
//! - `Graph`: insertion-ordered node map plus set-semantics edge collection,
//!   used while building.
//! - `GraphData`: the immutable serialized form all queries consume.
//!
//! **Design**:
//! - Node ids follow the grammar `kind ":" relpath [":" qualname]` with
//!   forward-slash relpaths; the id is the sole cross-crate handle.
//! - Nodes are never mutated after creation; a rebuild produces a fresh value.

pub mod model;
pub mod path_util;

pub use model::{Edge, EdgeKind, Graph, GraphData, Node, NodeKind};
pub use path_util::{normalize_path, relative_path, PathError};
