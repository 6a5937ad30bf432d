//! Tuple reader facade: contextual-tuple overlay and schema filtering.

use std::sync::Arc;

use futures::{future, stream, StreamExt, TryStreamExt};

use crate::error::DomainResult;
use crate::model::{Object, Tuple, TypeSystem};
use crate::validation::filter_invalid_tuples;

use super::traits::{RelationshipTupleReader, TupleStream};

/// Combines the persistent tuple reader with a request's contextual tuples
/// in a single iteration. Contextual tuples are not persisted and have
/// request scope only.
pub(crate) struct CombinedTupleReader<R> {
    inner: Arc<R>,
    contextual_tuples: Arc<Vec<Tuple>>,
}

impl<R> CombinedTupleReader<R>
where
    R: RelationshipTupleReader + 'static,
{
    pub(crate) fn new(inner: Arc<R>, contextual_tuples: Arc<Vec<Tuple>>) -> Self {
        Self {
            inner,
            contextual_tuples,
        }
    }

    /// Reads tuples matching `(object, relation)`: contextual tuples first,
    /// then the persistent reader's stream for the same filter.
    pub(crate) async fn read(
        &self,
        store_id: &str,
        object: &Object,
        relation: &str,
    ) -> DomainResult<TupleStream> {
        let object_key = object.to_string();
        let contextual: Vec<Tuple> = self
            .contextual_tuples
            .iter()
            .filter(|t| t.object == object_key && t.relation == relation)
            .cloned()
            .collect();

        let stored = self.inner.read(store_id, object, relation).await?;
        Ok(stream::iter(contextual.into_iter().map(Ok))
            .chain(stored)
            .boxed())
    }
}

/// Wraps a stream so that tuples invalid under the current schema are
/// silently skipped instead of aborting the expansion.
pub(crate) fn filter_valid(tuples: TupleStream, type_system: Arc<TypeSystem>) -> TupleStream {
    let keep = filter_invalid_tuples(type_system);
    tuples
        .try_filter(move |tuple| future::ready(keep(tuple)))
        .boxed()
}
