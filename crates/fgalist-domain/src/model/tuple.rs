//! Helpers for the tuple string grammar.
//!
//! Canonical subject forms are `type:id` (object), `type:id#relation`
//! (userset), and `type:*` (typed public wildcard). These strings are the
//! deduplication and map-lookup keys throughout the engine.

/// Builds the canonical `type:id` key for an object.
pub fn build_object(object_type: &str, object_id: &str) -> String {
    format!("{object_type}:{object_id}")
}

/// Splits `type:id` into `(type, id)`.
///
/// When no separator is present the whole input is returned as the id with an
/// empty type, matching the lenient split used on stored subject strings.
pub fn split_object(object: &str) -> (&str, &str) {
    match object.split_once(':') {
        Some((object_type, object_id)) => (object_type, object_id),
        None => ("", object),
    }
}

/// Splits a subject string into `(object, relation)`.
///
/// A bare object or wildcard yields an empty relation.
pub fn split_object_relation(user: &str) -> (&str, &str) {
    match user.split_once('#') {
        Some((object, relation)) => (object, relation),
        None => (user, ""),
    }
}

/// Canonical key of the typed public wildcard for `user_type` (`type:*`).
pub fn typed_public_wildcard(user_type: &str) -> String {
    format!("{user_type}:*")
}

/// Whether a subject string is a typed public wildcard (`type:*`).
pub fn is_typed_wildcard(user: &str) -> bool {
    match user.split_once(':') {
        Some((object_type, object_id)) => !object_type.is_empty() && object_id == "*",
        None => false,
    }
}
