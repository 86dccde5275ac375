//! # The Atlas: Queries Over the Built Graph
//!
//! **Role**: Read-only analysis of the serialized graph value — callers and
//! callees, reachability in both directions, shortest paths, fan-in/fan-out
//! statistics, focused subgraph export, and coercion of user-friendly node
//! references to canonical ids.
//!
//! Everything here is pure over an immutable [`common::GraphData`]; no
//! operation mutates or rebuilds the graph.

pub mod queries;
pub mod resolver;
pub mod stats;
pub mod viz;

pub use queries::{callees, callers, dependencies, path, reverse_dependencies};
pub use resolver::{resolve_node_id, suggest_nodes};
pub use stats::{overview, GraphOverview};
pub use viz::{export_dot, export_mermaid, Direction, ExportMeta};
