//! Authorization model types and lookups.
//!
//! This module contains:
//! - Core type definitions (Object, Tuple, Userset rewrites)
//! - The tuple string grammar helpers
//! - Type system for efficient lookups with caching
//! - Relationship graph for entrypoint reachability checks

mod graph;
pub mod tuple;
mod type_system;
mod types;

pub use graph::{
    RelationReference, RelationshipEdge, RelationshipEdgeKind, RelationshipGraph,
};
pub use type_system::TypeSystem;
pub use types::{
    AuthorizationModel, Object, RelationDefinition, Tuple, TypeDefinition, Userset,
};
