//! Tuple validity under the current schema.
//!
//! Stored tuples may outlive schema edits. The expansion engine tolerates
//! this by dropping tuples that no longer fit the model instead of aborting:
//! unknown types, removed relations, and subjects the relation's type
//! constraints no longer permit are all silently skipped.

use std::sync::Arc;

use crate::model::tuple::{is_typed_wildcard, split_object, split_object_relation};
use crate::model::{Tuple, TypeSystem};

/// Returns a predicate that keeps only tuples valid under the given type
/// system. Invalid tuples are dropped, never surfaced as errors.
pub fn filter_invalid_tuples(type_system: Arc<TypeSystem>) -> impl Fn(&Tuple) -> bool {
    move |tuple| tuple_is_valid(&type_system, tuple)
}

fn tuple_is_valid(type_system: &TypeSystem, tuple: &Tuple) -> bool {
    if type_system.validate_tuple(tuple).is_err() {
        return false;
    }

    let (object_type, _) = split_object(&tuple.object);
    let relation_def = match type_system.get_relation(object_type, &tuple.relation) {
        Ok(def) => def,
        Err(_) => return false,
    };

    // An empty constraint list places no restriction on subject types.
    if relation_def.type_constraints.is_empty() {
        return true;
    }

    user_matches_constraints(&tuple.user, &relation_def.type_constraints)
}

/// Whether a subject string is admitted by a relation's type constraints.
///
/// - `user:alice` requires a bare `user` constraint
/// - `user:*` requires the `user:*` wildcard constraint
/// - `group:eng#member` requires the `group#member` userset constraint
fn user_matches_constraints(user: &str, constraints: &[String]) -> bool {
    let (user_object, user_relation) = split_object_relation(user);
    let (user_type, _) = split_object(user_object);

    constraints.iter().any(|constraint| {
        if let Some((constraint_type, constraint_relation)) = constraint.split_once('#') {
            return user_type == constraint_type
                && !user_relation.is_empty()
                && user_relation == constraint_relation;
        }
        if let Some((constraint_type, marker)) = constraint.split_once(':') {
            return marker == "*" && is_typed_wildcard(user) && user_type == constraint_type;
        }
        user_relation.is_empty() && !is_typed_wildcard(user) && user_type == constraint
    })
}
