//! Internal per-expansion request state.

use std::collections::HashSet;
use std::sync::Arc;

use crate::model::{Object, Tuple};

use super::types::{ListUsersRequest, UserFilter};

/// State carried by each sub-expansion.
///
/// The filter list and contextual tuples are immutable for the lifetime of
/// the root request and shared by reference; only `object` and `relation`
/// change between sub-calls. The visited set is owned and copied whenever
/// the expansion branches, so sibling branches keep independent cycle state
/// and cannot suppress each other.
#[derive(Debug, Clone)]
pub(crate) struct ExpansionRequest {
    pub(crate) store_id: String,
    pub(crate) authorization_model_id: String,
    pub(crate) object: Object,
    pub(crate) relation: String,
    pub(crate) user_filters: Arc<Vec<UserFilter>>,
    pub(crate) contextual_tuples: Arc<Vec<Tuple>>,
    visited: HashSet<String>,
}

impl ExpansionRequest {
    pub(crate) fn from_request(request: &ListUsersRequest) -> Self {
        Self {
            store_id: request.store_id.clone(),
            authorization_model_id: request.authorization_model_id.clone(),
            object: request.object.clone(),
            relation: request.relation.clone(),
            user_filters: Arc::new(request.user_filters.clone()),
            contextual_tuples: Arc::clone(&request.contextual_tuples),
            visited: HashSet::new(),
        }
    }

    /// Clone for a sub-expansion rooted at a new object and relation.
    pub(crate) fn descend(&self, object: Object, relation: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.object = object;
        next.relation = relation.into();
        next
    }

    /// Clone for a computed userset: same object, rewritten relation.
    pub(crate) fn rewritten(&self, relation: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.relation = relation.into();
        next
    }

    /// Cycle guard. Marks `object#relation` as visited on this path and
    /// returns false when it already was, in which case the node must
    /// produce no results.
    pub(crate) fn enter(&mut self) -> bool {
        self.visited.insert(format!("{}#{}", self.object, self.relation))
    }

    /// The first user filter; sole basis for wildcard-key construction.
    /// Request validation guarantees the list is non-empty.
    pub(crate) fn primary_filter(&self) -> &UserFilter {
        &self.user_filters[0]
    }
}
