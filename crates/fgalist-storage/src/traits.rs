//! DataStore trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fgalist_domain::model::AuthorizationModel;

use crate::error::{StorageError, StorageResult};

/// Maximum length for string fields.
const MAX_FIELD_LENGTH: usize = 255;

/// A store record.
#[derive(Debug, Clone)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A relationship tuple as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredTuple {
    pub object_type: String,
    pub object_id: String,
    pub relation: String,
    pub user_type: String,
    pub user_id: String,
    pub user_relation: Option<String>,
}

impl StoredTuple {
    pub fn new(
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        relation: impl Into<String>,
        user_type: impl Into<String>,
        user_id: impl Into<String>,
        user_relation: Option<String>,
    ) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
            relation: relation.into(),
            user_type: user_type.into(),
            user_id: user_id.into(),
            user_relation,
        }
    }

    /// The subject in canonical string form (`type:id`, `type:id#relation`).
    pub fn user_string(&self) -> String {
        match &self.user_relation {
            Some(user_relation) => {
                format!("{}:{}#{}", self.user_type, self.user_id, user_relation)
            }
            None => format!("{}:{}", self.user_type, self.user_id),
        }
    }
}

/// An authorization model as persisted, newest last.
#[derive(Debug, Clone)]
pub struct StoredAuthorizationModel {
    pub id: String,
    pub model: AuthorizationModel,
    pub created_at: DateTime<Utc>,
}

/// Validate a store ID.
///
/// # Errors
/// Returns `StorageError::InvalidInput` if the store ID is empty or too long.
pub fn validate_store_id(store_id: &str) -> StorageResult<()> {
    validate_field("store_id", store_id)
}

/// Validate a stored tuple structurally: required fields present, no field
/// over length.
///
/// # Errors
/// Returns `StorageError::InvalidInput` if any field is empty or too long.
pub fn validate_tuple(tuple: &StoredTuple) -> StorageResult<()> {
    validate_field("object_type", &tuple.object_type)?;
    validate_field("object_id", &tuple.object_id)?;
    validate_field("relation", &tuple.relation)?;
    validate_field("user_type", &tuple.user_type)?;
    validate_field("user_id", &tuple.user_id)?;
    if let Some(ref user_relation) = tuple.user_relation {
        validate_field("user_relation", user_relation)?;
    }
    Ok(())
}

fn validate_field(name: &str, value: &str) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageError::InvalidInput {
            message: format!("{name} cannot be empty"),
        });
    }
    if value.len() > MAX_FIELD_LENGTH {
        return Err(StorageError::InvalidInput {
            message: format!("{name} exceeds maximum length of {MAX_FIELD_LENGTH} characters"),
        });
    }
    Ok(())
}

/// Storage backend contract: store management, tuple reads and writes, and
/// authorization-model versions.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Creates a store.
    async fn create_store(&self, id: &str, name: &str) -> StorageResult<Store>;

    /// Gets a store by id.
    async fn get_store(&self, id: &str) -> StorageResult<Store>;

    /// Writes a tuple into a store. Idempotent for identical tuples.
    async fn write_tuple(&self, store_id: &str, tuple: StoredTuple) -> StorageResult<()>;

    /// Deletes a tuple from a store, if present.
    async fn delete_tuple(&self, store_id: &str, tuple: &StoredTuple) -> StorageResult<()>;

    /// Reads the tuples matching `(object_type, object_id, relation)`.
    async fn read_tuples(
        &self,
        store_id: &str,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> StorageResult<Vec<StoredTuple>>;

    /// Persists an authorization model version for a store.
    async fn write_authorization_model(
        &self,
        store_id: &str,
        model_id: &str,
        model: AuthorizationModel,
    ) -> StorageResult<()>;
}
