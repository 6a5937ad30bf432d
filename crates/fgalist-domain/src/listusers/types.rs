//! Request and response types for the ListUsers query.

use std::fmt;
use std::sync::Arc;

use crate::error::{DomainError, DomainResult};
use crate::model::tuple::{split_object, split_object_relation};
use crate::model::{Object, Tuple};

/// Request for listing the subjects related to an object via a relation.
#[derive(Debug, Clone)]
pub struct ListUsersRequest {
    /// The store ID to query.
    pub store_id: String,
    /// The authorization model to evaluate against. Empty selects the
    /// store's latest model.
    pub authorization_model_id: String,
    /// The target object.
    pub object: Object,
    /// The target relation on the object.
    pub relation: String,
    /// Which subject shapes the caller wants returned; the first entry is
    /// the primary filter. Must not be empty.
    pub user_filters: Vec<UserFilter>,
    /// Request-scoped tuples overlaid on the store for this evaluation.
    /// Wrapped in Arc for cheap cloning during expansion.
    pub contextual_tuples: Arc<Vec<Tuple>>,
}

impl ListUsersRequest {
    /// Creates a new request without contextual tuples.
    pub fn new(
        store_id: impl Into<String>,
        object: Object,
        relation: impl Into<String>,
        user_filters: Vec<UserFilter>,
    ) -> Self {
        Self {
            store_id: store_id.into(),
            authorization_model_id: String::new(),
            object,
            relation: relation.into(),
            user_filters,
            contextual_tuples: Arc::new(Vec::new()),
        }
    }

    /// Sets the authorization model to evaluate against.
    pub fn with_model_id(mut self, authorization_model_id: impl Into<String>) -> Self {
        self.authorization_model_id = authorization_model_id.into();
        self
    }

    /// Attaches contextual tuples to the request.
    pub fn with_contextual_tuples(mut self, contextual_tuples: Vec<Tuple>) -> Self {
        self.contextual_tuples = Arc::new(contextual_tuples);
        self
    }
}

/// Selects which subjects a ListUsers call returns: a bare type matches
/// concrete objects of that type, a type with a relation matches usersets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFilter {
    pub user_type: String,
    pub relation: Option<String>,
}

impl UserFilter {
    /// Creates a filter matching concrete objects of `user_type`.
    pub fn new(user_type: impl Into<String>) -> Self {
        Self {
            user_type: user_type.into(),
            relation: None,
        }
    }

    /// Creates a filter matching usersets `user_type:_#relation`.
    pub fn with_relation(user_type: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            user_type: user_type.into(),
            relation: Some(relation.into()),
        }
    }
}

/// A subject in a ListUsers response.
///
/// The `Display` form (`type:id`, `type:id#relation`, `type:*`) is the
/// canonical key used for deduplication and set algebra.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserResult {
    /// A concrete object.
    Object { user_type: String, user_id: String },
    /// A userset: everyone related to the object via the relation.
    Userset {
        user_type: String,
        user_id: String,
        relation: String,
    },
    /// The typed public wildcard: every object of the type.
    Wildcard { user_type: String },
}

impl UserResult {
    /// Creates a concrete object subject.
    pub fn object(user_type: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::Object {
            user_type: user_type.into(),
            user_id: user_id.into(),
        }
    }

    /// Creates a userset subject.
    pub fn userset(
        user_type: impl Into<String>,
        user_id: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self::Userset {
            user_type: user_type.into(),
            user_id: user_id.into(),
            relation: relation.into(),
        }
    }

    /// Creates a typed public wildcard subject.
    pub fn wildcard(user_type: impl Into<String>) -> Self {
        Self::Wildcard {
            user_type: user_type.into(),
        }
    }

    /// Parses a subject from its canonical string form.
    pub fn parse(value: &str) -> DomainResult<Self> {
        let (object, relation) = split_object_relation(value);
        let (user_type, user_id) = split_object(object);
        if user_type.is_empty() || user_id.is_empty() {
            return Err(DomainError::InvalidUserFormat {
                value: value.to_string(),
            });
        }
        if !relation.is_empty() {
            return Ok(Self::userset(user_type, user_id, relation));
        }
        if user_id == "*" {
            return Ok(Self::wildcard(user_type));
        }
        Ok(Self::object(user_type, user_id))
    }
}

impl fmt::Display for UserResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object { user_type, user_id } => write!(f, "{user_type}:{user_id}"),
            Self::Userset {
                user_type,
                user_id,
                relation,
            } => write!(f, "{user_type}:{user_id}#{relation}"),
            Self::Wildcard { user_type } => write!(f, "{user_type}:*"),
        }
    }
}

/// Result of a ListUsers query: the deduplicated set of matching subjects,
/// in unspecified order.
#[derive(Debug, Clone, Default)]
pub struct ListUsersResult {
    pub users: Vec<UserResult>,
}
