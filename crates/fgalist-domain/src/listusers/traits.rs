//! Traits for the collaborators the ListUsers engine consumes.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::DomainResult;
use crate::model::{Object, Tuple, TypeSystem};

/// A lazy sequence of tuples. Exhaustion ends the stream; dropping it
/// releases the underlying read on any exit path.
pub type TupleStream = BoxStream<'static, DomainResult<Tuple>>;

/// Read access to relationship tuples.
#[async_trait]
pub trait RelationshipTupleReader: Send + Sync {
    /// Reads the tuples matching `(object, relation)` in the given store.
    async fn read(
        &self,
        store_id: &str,
        object: &Object,
        relation: &str,
    ) -> DomainResult<TupleStream>;
}

/// Resolves the type system to evaluate a request against.
#[async_trait]
pub trait TypeSystemResolver: Send + Sync {
    /// Resolves the type system for `(store_id, authorization_model_id)`.
    /// An empty model id selects the store's latest model.
    async fn resolve(
        &self,
        store_id: &str,
        authorization_model_id: &str,
    ) -> DomainResult<Arc<TypeSystem>>;
}
