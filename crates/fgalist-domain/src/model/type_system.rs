//! Type system for authorization model lookups with caching.
//!
//! The `TypeSystem` provides efficient lookups for types and relations
//! with internal caching using `DashMap` for thread-safe concurrent access.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{DomainError, DomainResult};

use super::tuple::{is_typed_wildcard, split_object, split_object_relation};
use super::types::{AuthorizationModel, RelationDefinition, Tuple, TypeDefinition};

/// Type system providing cached access to authorization model types and
/// relations.
///
/// # Thread Safety
///
/// The `TypeSystem` is thread-safe and can be shared across async tasks.
/// It uses `DashMap` internally for lock-free concurrent reads and minimal
/// contention on writes.
#[derive(Debug)]
pub struct TypeSystem {
    /// The underlying authorization model.
    model: Arc<AuthorizationModel>,
    /// Cache for type definitions, keyed by type name.
    type_cache: DashMap<String, Arc<TypeDefinition>>,
    /// Cache for relation definitions, keyed by "type_name:relation_name".
    relation_cache: DashMap<String, Arc<RelationDefinition>>,
}

impl TypeSystem {
    /// Creates a new `TypeSystem` from an authorization model.
    ///
    /// The type system will lazily cache lookups as they are accessed.
    pub fn new(model: AuthorizationModel) -> Self {
        Self {
            model: Arc::new(model),
            type_cache: DashMap::new(),
            relation_cache: DashMap::new(),
        }
    }

    /// Returns a reference to the underlying authorization model.
    pub fn model(&self) -> &AuthorizationModel {
        &self.model
    }

    /// Gets a type definition by name, using the cache if available.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::TypeNotFound` if the type does not exist in the model.
    pub fn get_type(&self, type_name: &str) -> DomainResult<Arc<TypeDefinition>> {
        if let Some(cached) = self.type_cache.get(type_name) {
            return Ok(Arc::clone(cached.value()));
        }

        let type_def = self
            .model
            .type_definitions
            .iter()
            .find(|td| td.type_name == type_name)
            .ok_or_else(|| DomainError::TypeNotFound {
                type_name: type_name.to_string(),
            })?;

        let type_def_arc = Arc::new(type_def.clone());
        self.type_cache
            .insert(type_name.to_string(), Arc::clone(&type_def_arc));
        Ok(type_def_arc)
    }

    /// Gets a relation definition for a specific type.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::TypeNotFound` if the type does not exist.
    /// Returns `DomainError::RelationNotFound` if the relation does not exist on the type.
    pub fn get_relation(
        &self,
        type_name: &str,
        relation: &str,
    ) -> DomainResult<Arc<RelationDefinition>> {
        let cache_key = format!("{}:{}", type_name, relation);

        if let Some(cached) = self.relation_cache.get(&cache_key) {
            return Ok(Arc::clone(cached.value()));
        }

        let type_def = self.get_type(type_name)?;

        let relation_def = type_def
            .relations
            .iter()
            .find(|r| r.name == relation)
            .ok_or_else(|| DomainError::RelationNotFound {
                type_name: type_name.to_string(),
                relation: relation.to_string(),
            })?;

        let relation_def_arc = Arc::new(relation_def.clone());
        self.relation_cache
            .insert(cache_key, Arc::clone(&relation_def_arc));
        Ok(relation_def_arc)
    }

    /// Checks if a type exists in the model.
    pub fn has_type(&self, type_name: &str) -> bool {
        self.get_type(type_name).is_ok()
    }

    /// Checks if a relation exists on a type.
    pub fn has_relation(&self, type_name: &str, relation: &str) -> bool {
        self.get_relation(type_name, relation).is_ok()
    }

    /// Validates a tuple structurally against the type system.
    ///
    /// Checks that:
    /// - The object parses and its type exists
    /// - The relation exists on the object type
    /// - The user type exists (wildcards skip the id portion)
    /// - A userset user references an existing relation on its type
    ///
    /// Subject-type permission (type constraints) is checked separately by
    /// [`crate::validation::filter_invalid_tuples`].
    ///
    /// # Errors
    ///
    /// Returns appropriate `DomainError` variants if validation fails.
    pub fn validate_tuple(&self, tuple: &Tuple) -> DomainResult<()> {
        let (object_type, object_id) = split_object(&tuple.object);
        if object_type.is_empty() || object_id.is_empty() {
            return Err(DomainError::InvalidObjectFormat {
                value: tuple.object.clone(),
            });
        }

        self.get_type(object_type)?;
        self.get_relation(object_type, &tuple.relation)?;

        let (user_object, user_relation) = split_object_relation(&tuple.user);
        let (user_type, user_id) = split_object(user_object);
        if user_type.is_empty() || user_id.is_empty() {
            return Err(DomainError::InvalidUserFormat {
                value: tuple.user.clone(),
            });
        }

        self.get_type(user_type)?;

        if !user_relation.is_empty() {
            if is_typed_wildcard(user_object) {
                // A wildcard cannot carry a userset relation.
                return Err(DomainError::InvalidUserFormat {
                    value: tuple.user.clone(),
                });
            }
            self.get_relation(user_type, user_relation)?;
        }

        Ok(())
    }

    /// Clears the internal caches.
    ///
    /// This is primarily useful for testing or when the model is updated.
    pub fn clear_cache(&self) {
        self.type_cache.clear();
        self.relation_cache.clear();
    }

    /// Returns the number of cached type definitions.
    pub fn type_cache_size(&self) -> usize {
        self.type_cache.len()
    }

    /// Returns the number of cached relation definitions.
    pub fn relation_cache_size(&self) -> usize {
        self.relation_cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::{RelationDefinition, TypeDefinition, Userset};

    fn create_test_model() -> AuthorizationModel {
        AuthorizationModel::with_types(
            "1.1",
            vec![
                TypeDefinition {
                    type_name: "user".to_string(),
                    relations: vec![],
                },
                TypeDefinition {
                    type_name: "document".to_string(),
                    relations: vec![
                        RelationDefinition {
                            name: "owner".to_string(),
                            type_constraints: vec!["user".to_string()],
                            rewrite: Userset::This,
                        },
                        RelationDefinition {
                            name: "viewer".to_string(),
                            type_constraints: vec!["user".to_string()],
                            rewrite: Userset::Union {
                                children: vec![
                                    Userset::This,
                                    Userset::ComputedUserset {
                                        relation: "owner".to_string(),
                                    },
                                ],
                            },
                        },
                    ],
                },
                TypeDefinition {
                    type_name: "folder".to_string(),
                    relations: vec![RelationDefinition {
                        name: "viewer".to_string(),
                        type_constraints: vec!["user".to_string()],
                        rewrite: Userset::This,
                    }],
                },
            ],
        )
    }

    #[test]
    fn test_get_type_success() {
        let ts = TypeSystem::new(create_test_model());

        let user_type = ts.get_type("user").unwrap();
        assert_eq!(user_type.type_name, "user");
        assert!(user_type.relations.is_empty());

        let doc_type = ts.get_type("document").unwrap();
        assert_eq!(doc_type.relations.len(), 2);
    }

    #[test]
    fn test_get_type_not_found() {
        let ts = TypeSystem::new(create_test_model());

        let result = ts.get_type("nonexistent");
        assert!(matches!(
            result.unwrap_err(),
            DomainError::TypeNotFound { type_name } if type_name == "nonexistent"
        ));
    }

    #[test]
    fn test_get_type_caching() {
        let ts = TypeSystem::new(create_test_model());

        assert_eq!(ts.type_cache_size(), 0);
        let _ = ts.get_type("document").unwrap();
        assert_eq!(ts.type_cache_size(), 1);
        let _ = ts.get_type("document").unwrap();
        assert_eq!(ts.type_cache_size(), 1);
        let _ = ts.get_type("user").unwrap();
        assert_eq!(ts.type_cache_size(), 2);
    }

    #[test]
    fn test_get_relation_success() {
        let ts = TypeSystem::new(create_test_model());

        let viewer_rel = ts.get_relation("document", "viewer").unwrap();
        assert_eq!(viewer_rel.name, "viewer");
    }

    #[test]
    fn test_get_relation_not_found() {
        let ts = TypeSystem::new(create_test_model());

        assert!(matches!(
            ts.get_relation("nonexistent", "viewer").unwrap_err(),
            DomainError::TypeNotFound { .. }
        ));
        assert!(matches!(
            ts.get_relation("document", "nonexistent").unwrap_err(),
            DomainError::RelationNotFound { type_name, relation }
            if type_name == "document" && relation == "nonexistent"
        ));
    }

    #[test]
    fn test_validate_tuple_success() {
        let ts = TypeSystem::new(create_test_model());

        let tuple = Tuple::new("user:alice", "viewer", "document:readme");
        assert!(ts.validate_tuple(&tuple).is_ok());

        let tuple = Tuple::new("user:*", "viewer", "document:readme");
        assert!(ts.validate_tuple(&tuple).is_ok());

        let tuple = Tuple::new("folder:docs#viewer", "viewer", "document:readme");
        assert!(ts.validate_tuple(&tuple).is_ok());
    }

    #[test]
    fn test_validate_tuple_unknown_object_type() {
        let ts = TypeSystem::new(create_test_model());

        let tuple = Tuple::new("user:alice", "viewer", "nonexistent:doc1");
        assert!(matches!(
            ts.validate_tuple(&tuple).unwrap_err(),
            DomainError::TypeNotFound { .. }
        ));
    }

    #[test]
    fn test_validate_tuple_unknown_relation() {
        let ts = TypeSystem::new(create_test_model());

        let tuple = Tuple::new("user:alice", "nonexistent", "document:readme");
        assert!(matches!(
            ts.validate_tuple(&tuple).unwrap_err(),
            DomainError::RelationNotFound { .. }
        ));
    }

    #[test]
    fn test_validate_tuple_userset_with_unknown_relation() {
        let ts = TypeSystem::new(create_test_model());

        let tuple = Tuple::new("folder:docs#nonexistent", "viewer", "document:readme");
        assert!(matches!(
            ts.validate_tuple(&tuple).unwrap_err(),
            DomainError::RelationNotFound { .. }
        ));
    }

    #[test]
    fn test_clear_cache() {
        let ts = TypeSystem::new(create_test_model());

        let _ = ts.get_type("document").unwrap();
        let _ = ts.get_relation("document", "viewer").unwrap();
        assert!(ts.type_cache_size() > 0);
        assert!(ts.relation_cache_size() > 0);

        ts.clear_cache();
        assert_eq!(ts.type_cache_size(), 0);
        assert_eq!(ts.relation_cache_size(), 0);
    }
}
