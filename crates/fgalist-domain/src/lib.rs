//! fgalist-domain: ListUsers evaluation engine
//!
//! This crate contains the core evaluation logic including:
//! - Authorization model types and cached lookups
//! - Relationship graph for entrypoint reachability pruning
//! - Tuple validity filtering under the current schema
//! - The recursive, concurrent ListUsers expansion
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               fgalist-domain                │
//! ├─────────────────────────────────────────────┤
//! │  model/      - Types, type system, graph    │
//! │  validation/ - Schema validity filtering    │
//! │  listusers/  - Rewrite expansion engine     │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod listusers;
pub mod model;
pub mod validation;

pub use error::{DomainError, DomainResult};
