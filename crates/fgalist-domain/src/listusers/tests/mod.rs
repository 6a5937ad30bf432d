//! Tests for the ListUsers engine.
//!
//! Organized by functionality:
//! - Direct relations, wildcards and userset subjects
//! - Union, intersection and exclusion semantics
//! - Filter matching and the intersection/exclusion gating rule
//! - Contextual tuples
//! - Cycle safety and error propagation


mod list_users_tests;
