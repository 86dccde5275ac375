//! # The Bureau: Service Layer
//!
//! **Role**: The structured entry points a user-facing shell calls. Every
//! operation returns either a serializable reply or a serializable
//! [`Failure`] — nothing here panics or propagates raw errors through the
//! public surface.
//!
//! **Responsibilities**:
//! - Input normalization: resolve-mode and query-type synonyms, rejection of
//!   control characters in paths.
//! - Cache orchestration: builds go through the [`archive::GraphCache`]
//!   behind a mutex (cache operations appear atomic to callers, and
//!   concurrent builds of the same key serialize).
//! - Transparent staleness refresh before serving reads, reported via the
//!   `refreshed` flag on replies.
//! - Unknown node references come back as failures carrying suggestions
//!   from the node-id resolver, not as empty results.

pub mod inputs;
pub mod service;

pub use inputs::QueryType;
pub use service::{
    BuildRequest, CallClassification, CallClassifier, Certainty, ClassifierError,
    ClassifyRequest, Failure, GraphService,
};
