//! In-memory storage implementation.
//!
//! Uses `HashSet<StoredTuple>` for O(1) write/delete operations and `DashMap`
//! for thread-safe concurrent access without explicit locks. Suitable for
//! tests and single-process deployments.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tracing::instrument;

use fgalist_domain::error::{DomainError, DomainResult};
use fgalist_domain::listusers::{RelationshipTupleReader, TupleStream, TypeSystemResolver};
use fgalist_domain::model::{AuthorizationModel, Object, Tuple, TypeSystem};

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    validate_store_id, validate_tuple, DataStore, Store, StoredAuthorizationModel, StoredTuple,
};

/// A model version with its pre-built type system.
struct ModelEntry {
    stored: StoredAuthorizationModel,
    type_system: Arc<TypeSystem>,
}

/// In-memory implementation of [`DataStore`].
///
/// Also implements the domain's [`RelationshipTupleReader`] and
/// [`TypeSystemResolver`] seams, so a `ListUsersQuery` can run directly
/// against it.
#[derive(Default)]
pub struct MemoryDataStore {
    stores: DashMap<String, Store>,
    /// Tuples stored as HashSet for O(1) insert/delete/contains operations.
    tuples: DashMap<String, HashSet<StoredTuple>>,
    /// Model versions keyed by store_id, insertion order (newest at the end).
    authorization_models: DashMap<String, Vec<ModelEntry>>,
}

impl MemoryDataStore {
    /// Creates a new in-memory data store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory data store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn create_store(&self, id: &str, name: &str) -> StorageResult<Store> {
        validate_store_id(id)?;

        let now = chrono::Utc::now();
        let store = Store {
            id: id.to_string(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };

        // Atomic entry API prevents a race between check and insert.
        use dashmap::mapref::entry::Entry;
        match self.stores.entry(id.to_string()) {
            Entry::Occupied(_) => {
                return Err(StorageError::StoreAlreadyExists {
                    store_id: id.to_string(),
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(store.clone());
            }
        }
        self.tuples.entry(id.to_string()).or_default();

        Ok(store)
    }

    async fn get_store(&self, id: &str) -> StorageResult<Store> {
        self.stores
            .get(id)
            .map(|s| s.value().clone())
            .ok_or_else(|| StorageError::StoreNotFound {
                store_id: id.to_string(),
            })
    }

    #[instrument(skip(self, tuple), fields(store_id = %store_id))]
    async fn write_tuple(&self, store_id: &str, tuple: StoredTuple) -> StorageResult<()> {
        validate_tuple(&tuple)?;
        let mut tuples =
            self.tuples
                .get_mut(store_id)
                .ok_or_else(|| StorageError::StoreNotFound {
                    store_id: store_id.to_string(),
                })?;
        tuples.insert(tuple);
        Ok(())
    }

    async fn delete_tuple(&self, store_id: &str, tuple: &StoredTuple) -> StorageResult<()> {
        let mut tuples =
            self.tuples
                .get_mut(store_id)
                .ok_or_else(|| StorageError::StoreNotFound {
                    store_id: store_id.to_string(),
                })?;
        tuples.remove(tuple);
        Ok(())
    }

    async fn read_tuples(
        &self,
        store_id: &str,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> StorageResult<Vec<StoredTuple>> {
        let tuples = self
            .tuples
            .get(store_id)
            .ok_or_else(|| StorageError::StoreNotFound {
                store_id: store_id.to_string(),
            })?;
        Ok(tuples
            .iter()
            .filter(|t| {
                t.object_type == object_type && t.object_id == object_id && t.relation == relation
            })
            .cloned()
            .collect())
    }

    #[instrument(skip(self, model), fields(store_id = %store_id, model_id = %model_id))]
    async fn write_authorization_model(
        &self,
        store_id: &str,
        model_id: &str,
        model: AuthorizationModel,
    ) -> StorageResult<()> {
        if !self.stores.contains_key(store_id) {
            return Err(StorageError::StoreNotFound {
                store_id: store_id.to_string(),
            });
        }
        let entry = ModelEntry {
            stored: StoredAuthorizationModel {
                id: model_id.to_string(),
                model: model.clone(),
                created_at: chrono::Utc::now(),
            },
            type_system: Arc::new(TypeSystem::new(model)),
        };
        self.authorization_models
            .entry(store_id.to_string())
            .or_default()
            .push(entry);
        Ok(())
    }
}

#[async_trait]
impl RelationshipTupleReader for MemoryDataStore {
    async fn read(
        &self,
        store_id: &str,
        object: &Object,
        relation: &str,
    ) -> DomainResult<TupleStream> {
        let stored = DataStore::read_tuples(
            self,
            store_id,
            &object.object_type,
            &object.object_id,
            relation,
        )
        .await
        .map_err(|e| DomainError::StorageOperationFailed {
            reason: e.to_string(),
        })?;

        let object_key = object.to_string();
        let tuples: Vec<Tuple> = stored
            .into_iter()
            .map(|t| Tuple::new(t.user_string(), relation, object_key.clone()))
            .collect();
        Ok(stream::iter(tuples.into_iter().map(Ok)).boxed())
    }
}

#[async_trait]
impl TypeSystemResolver for MemoryDataStore {
    async fn resolve(
        &self,
        store_id: &str,
        authorization_model_id: &str,
    ) -> DomainResult<Arc<TypeSystem>> {
        let entries = self.authorization_models.get(store_id).ok_or_else(|| {
            DomainError::AuthorizationModelNotFound {
                store_id: store_id.to_string(),
            }
        })?;
        let entry = if authorization_model_id.is_empty() {
            entries.last()
        } else {
            entries
                .iter()
                .find(|e| e.stored.id == authorization_model_id)
        };
        entry
            .map(|e| Arc::clone(&e.type_system))
            .ok_or_else(|| DomainError::AuthorizationModelNotFound {
                store_id: store_id.to_string(),
            })
    }
}
