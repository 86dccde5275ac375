//! # The Surveyor: Source Walking & Graph Construction
//!
//! **Role**: Converts a Python source tree into the call-and-containment
//! graph value defined in `common`.
//!
//! **Pipeline** (two-pass):
//! 1. **Index Pass**: Walk the tree, parse every source file, create file,
//!    class, function, and method nodes plus containment edges, and register
//!    which files define each class name.
//! 2. **Link Pass**: Revisit every function body, resolve each call
//!    expression through a fixed strategy ladder (syntactic fallback →
//!    semantic inference → receiver-type inference → unique-name last
//!    resort), and emit `call` edges for targets that exist in the graph.
//!
//! **Design**:
//! - Unresolvable calls and unreadable/unparseable files are dropped, never
//!   surfaced as errors; a partially resolvable tree is still useful.
//! - The semantic name-inference engine is a pluggable capability behind the
//!   [`semantic::SemanticResolver`] trait; every downstream strategy
//!   tolerates the engine being absent or returning nothing.
//! - Receiver typing is strictly scope-local: the class registry and the
//!   per-function constructor-assignment table live only for the duration
//!   of one build.

pub mod aliases;
pub mod builder;
pub mod collect;
pub mod discover;
pub mod parser;
pub mod resolve;
pub mod semantic;

pub use builder::{build_file_graph, build_function_graph, build_project_graph};
pub use parser::ParserHost;
pub use semantic::{InferredDefinition, ProjectInference, SemanticResolver};

use serde::{Deserialize, Serialize};

/// Errors produced while surveying a source tree.
#[derive(Debug, thiserror::Error)]
pub enum SurveyorError {
    /// Tree-sitter failed to initialize or parse.
    #[error("Parse failure: {0}")]
    ParseFailure(String),

    /// I/O error (directory walk, file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Path could not be normalized or related to the root.
    #[error(transparent)]
    Path(#[from] common::PathError),
}

/// Builder pipeline selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Full call-and-containment graph.
    Function,
    /// File nodes and import edges only.
    File,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Function => "function",
            Granularity::File => "file",
        }
    }

    /// `"file"` selects the file pipeline; anything else the function pipeline.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => Granularity::File,
            _ => Granularity::Function,
        }
    }
}

/// Call-resolution mode: whether the semantic engine participates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMode {
    /// Syntactic strategies plus the semantic name-inference engine.
    Semantic,
    /// Syntactic strategies only; the engine is never consulted.
    FallbackOnly,
}

impl ResolveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveMode::Semantic => "semantic",
            ResolveMode::FallbackOnly => "fallback_only",
        }
    }
}

/// Options consumed by [`build_project_graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildOptions {
    pub granularity: Granularity,
    /// Keep engine-reported definitions outside the root as
    /// `<external>:name` pseudo-targets instead of dropping them.
    pub include_external: bool,
    pub resolve_calls: ResolveMode,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            granularity: Granularity::Function,
            include_external: false,
            resolve_calls: ResolveMode::Semantic,
        }
    }
}
