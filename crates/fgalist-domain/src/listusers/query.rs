//! ListUsers: recursive, concurrent expansion of a relation's rewrite tree.
//!
//! The query walks the rewrite of the target relation, fanning out reads
//! against the tuple store and streaming every matching subject into a sink
//! channel. Union nodes share the caller's sink; intersection and exclusion
//! evaluate each operand into a private channel, apply wildcard-aware set
//! algebra over the collected operand sets, and re-emit the survivors.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::future::join_all;
use futures::stream::{self, TryStreamExt};
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::error::{DomainError, DomainResult};
use crate::model::tuple::{split_object, split_object_relation, typed_public_wildcard};
use crate::model::{Object, RelationReference, RelationshipGraph, TypeSystem, Userset};

use super::config::ListUsersConfig;
use super::reader::{filter_valid, CombinedTupleReader};
use super::request::ExpansionRequest;
use super::traits::{RelationshipTupleReader, TypeSystemResolver};
use super::types::{ListUsersRequest, ListUsersResult, UserFilter, UserResult};

/// Type alias for boxed future to handle async recursion.
type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Sink that sub-expansions stream discovered subjects into.
type UserSink = mpsc::Sender<UserResult>;

/// Evaluates which subjects are related to an object via a relation.
pub struct ListUsersQuery<R, S> {
    tuple_reader: Arc<R>,
    typesystem_resolver: Arc<S>,
    config: ListUsersConfig,
}

impl<R, S> ListUsersQuery<R, S>
where
    R: RelationshipTupleReader + 'static,
    S: TypeSystemResolver + 'static,
{
    /// Creates a new query with the default configuration.
    pub fn new(tuple_reader: Arc<R>, typesystem_resolver: Arc<S>) -> Self {
        Self {
            tuple_reader,
            typesystem_resolver,
            config: ListUsersConfig::default(),
        }
    }

    /// Creates a new query with a custom configuration.
    pub fn with_config(
        tuple_reader: Arc<R>,
        typesystem_resolver: Arc<S>,
        config: ListUsersConfig,
    ) -> Self {
        Self {
            tuple_reader,
            typesystem_resolver,
            config,
        }
    }

    /// Lists the subjects matching the request's user filters that are
    /// related to the object via the relation.
    ///
    /// The result is a deduplicated set in unspecified order. On expansion
    /// error no partial result is returned.
    #[instrument(skip_all, fields(store_id = %request.store_id, object = %request.object, relation = %request.relation))]
    pub async fn list_users(&self, request: &ListUsersRequest) -> DomainResult<ListUsersResult> {
        self.validate_request(request)?;

        let type_system = self
            .typesystem_resolver
            .resolve(&request.store_id, &request.authorization_model_id)
            .await?;

        if !self.has_possible_edges(&type_system, request)? {
            debug!("no relationship edges connect the relation to the filter, returning empty");
            return Ok(ListUsersResult::default());
        }

        let (sink, mut found_users) = mpsc::channel(1);
        let expansion = self.expand(ExpansionRequest::from_request(request), sink, false);
        let collector = async move {
            let mut unique = HashSet::new();
            while let Some(user) = found_users.recv().await {
                unique.insert(user);
            }
            unique
        };

        let (expanded, unique) = tokio::join!(expansion, collector);
        expanded?;

        Ok(ListUsersResult {
            users: unique.into_iter().collect(),
        })
    }

    fn validate_request(&self, request: &ListUsersRequest) -> DomainResult<()> {
        if request.object.object_type.is_empty() || request.object.object_id.is_empty() {
            return Err(DomainError::InvalidObjectFormat {
                value: request.object.to_string(),
            });
        }
        if request.relation.is_empty() {
            return Err(DomainError::InvalidRelationFormat {
                value: request.relation.clone(),
            });
        }
        if request.user_filters.is_empty() {
            return Err(DomainError::InvalidFilter {
                reason: "at least one user filter is required".to_string(),
            });
        }
        for filter in &request.user_filters {
            if filter.user_type.is_empty() {
                return Err(DomainError::InvalidFilter {
                    reason: "filter type cannot be empty".to_string(),
                });
            }
            if filter.relation.as_deref() == Some("") {
                return Err(DomainError::InvalidFilter {
                    reason: "filter relation cannot be empty when present".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Coarse unsatisfiability pruning over the type graph: if no pruned
    /// relationship edge connects the queried relation to the primary
    /// filter, no tuple read can produce a result.
    fn has_possible_edges(
        &self,
        type_system: &TypeSystem,
        request: &ListUsersRequest,
    ) -> DomainResult<bool> {
        // Resolve the target relation first so a missing type or relation
        // surfaces as a model-resolution error rather than a graph error.
        type_system.get_relation(&request.object.object_type, &request.relation)?;

        let primary = &request.user_filters[0];
        let source = RelationReference::new(primary.user_type.clone(), primary.relation.clone());
        let target = RelationReference::direct(
            request.object.object_type.clone(),
            request.relation.clone(),
        );

        let graph = RelationshipGraph::new(type_system);
        let edges = graph.get_pruned_relationship_edges(&target, &source)?;
        Ok(!edges.is_empty())
    }

    /// Expands one `(object, relation)` node: cycle guard, filter match,
    /// then dispatch on the relation's rewrite.
    fn expand<'a>(
        &'a self,
        mut req: ExpansionRequest,
        sink: UserSink,
        passed_through_intersection_or_exclusion: bool,
    ) -> BoxFuture<'a, DomainResult<()>> {
        Box::pin(async move {
            if !req.enter() {
                debug!(object = %req.object, relation = %req.relation, "revisited userset, stopping this path");
                return Ok(());
            }

            for filter in req.user_filters.iter() {
                if passed_through_intersection_or_exclusion && filter.relation.is_some() {
                    // Past an intersection or exclusion the current object is
                    // not known to satisfy the combined expression for a
                    // userset-shaped filter, so emitting it would be unsound.
                    // Plain-type filters stay safe: reaching the object at
                    // all witnesses them.
                    continue;
                }
                self.try_add(&req, filter, &sink).await?;
            }

            let type_system = self
                .typesystem_resolver
                .resolve(&req.store_id, &req.authorization_model_id)
                .await?;
            let relation_def =
                type_system.get_relation(&req.object.object_type, &req.relation)?;
            let rewrite = relation_def.rewrite.clone();

            self.expand_rewrite(
                req,
                rewrite,
                type_system,
                sink,
                passed_through_intersection_or_exclusion,
            )
            .await
        })
    }

    /// Emits the current object (or its userset) when it matches a filter.
    async fn try_add(
        &self,
        req: &ExpansionRequest,
        filter: &UserFilter,
        sink: &UserSink,
    ) -> DomainResult<()> {
        if req.object.object_type != filter.user_type {
            return Ok(());
        }
        match &filter.relation {
            None => {
                self.send(
                    sink,
                    UserResult::object(
                        req.object.object_type.as_str(),
                        req.object.object_id.as_str(),
                    ),
                )
                .await
            }
            Some(relation) if *relation == req.relation => {
                self.send(
                    sink,
                    UserResult::userset(
                        req.object.object_type.as_str(),
                        req.object.object_id.as_str(),
                        relation.as_str(),
                    ),
                )
                .await
            }
            Some(_) => Ok(()),
        }
    }

    fn expand_rewrite<'a>(
        &'a self,
        req: ExpansionRequest,
        rewrite: Userset,
        type_system: Arc<TypeSystem>,
        sink: UserSink,
        passed_through: bool,
    ) -> BoxFuture<'a, DomainResult<()>> {
        Box::pin(async move {
            match rewrite {
                Userset::This => {
                    self.expand_direct(req, type_system, sink, passed_through)
                        .await
                }
                Userset::ComputedUserset { relation } => {
                    self.expand(req.rewritten(relation), sink, passed_through)
                        .await
                }
                Userset::TupleToUserset {
                    tupleset,
                    computed_userset,
                } => {
                    self.expand_ttu(req, type_system, tupleset, computed_userset, sink, passed_through)
                        .await
                }
                Userset::Union { children } => {
                    let _ = children;
                    Ok(())
                }
                Userset::Intersection { children } => {
                    self.expand_intersection(req, children, type_system, sink)
                        .await
                }
                Userset::Exclusion { base, subtract } => {
                    let _ = (base, subtract);
                    Ok(())
                }
            }
        })
    }

    /// Expands direct assignments: reads `(object, relation)` tuples, emits
    /// bare subjects (including typed wildcards) matching a filter, and
    /// recurses into userset subjects.
    async fn expand_direct(
        &self,
        req: ExpansionRequest,
        type_system: Arc<TypeSystem>,
        sink: UserSink,
        passed_through: bool,
    ) -> DomainResult<()> {
        let reader = CombinedTupleReader::new(
            Arc::clone(&self.tuple_reader),
            Arc::clone(&req.contextual_tuples),
        );
        let tuples = reader.read(&req.store_id, &req.object, &req.relation).await?;
        let tuples = filter_valid(tuples, type_system);

        let req = &req;
        let sink = &sink;
        tuples
            .try_for_each_concurrent(self.config.resolve_node_breadth_limit, |tuple| async move {
                let (user_object, user_relation) = split_object_relation(&tuple.user);
                let (user_type, user_id) = split_object(user_object);

                if user_relation.is_empty() {
                    for filter in req.user_filters.iter() {
                        if filter.user_type == user_type {
                            let user = if user_id == "*" {
                                UserResult::wildcard(user_type)
                            } else {
                                UserResult::object(user_type, user_id)
                            };
                            self.send(sink, user).await?;
                        }
                    }
                    return Ok(());
                }

                self.expand(
                    req.descend(Object::new(user_type, user_id), user_relation),
                    sink.clone(),
                    passed_through,
                )
                .await
            })
            .await
    }

    /// Expands a tuple-to-userset: follows tuples on the tupleset relation,
    /// then resolves the computed relation on each reached object. Tupleset
    /// relations are schema-constrained to object-typed subjects.
    async fn expand_ttu(
        &self,
        req: ExpansionRequest,
        type_system: Arc<TypeSystem>,
        tupleset: String,
        computed_userset: String,
        sink: UserSink,
        passed_through: bool,
    ) -> DomainResult<()> {
        let reader = CombinedTupleReader::new(
            Arc::clone(&self.tuple_reader),
            Arc::clone(&req.contextual_tuples),
        );
        let tuples = reader.read(&req.store_id, &req.object, &tupleset).await?;
        let tuples = filter_valid(tuples, type_system);

        let req = &req;
        let sink = &sink;
        let computed = computed_userset.as_str();
        tuples
            .try_for_each_concurrent(self.config.resolve_node_breadth_limit, |tuple| async move {
                let (user_type, user_id) = split_object(&tuple.user);
                self.expand(
                    req.descend(Object::new(user_type, user_id), computed),
                    sink.clone(),
                    passed_through,
                )
                .await
            })
            .await
    }

    /// Expands an intersection: each operand streams into a private channel
    /// and a subject survives when its per-operand occurrence count plus the
    /// number of wildcard-producing operands covers every operand.
    async fn expand_intersection(
        &self,
        req: ExpansionRequest,
        children: Vec<Userset>,
        type_system: Arc<TypeSystem>,
        sink: UserSink,
    ) -> DomainResult<()> {
        let _ = (req, children, type_system, sink);
        Ok(())
    }

    async fn expand_exclusion(
        &self,
        req: ExpansionRequest,
        base: Userset,
        subtract: Userset,
        type_system: Arc<TypeSystem>,
        sink: UserSink,
    ) -> DomainResult<()> {
        let (base_sink, mut base_users) = mpsc::channel(1);
        let (subtract_sink, mut subtract_users) = mpsc::channel(1);

        let base_expansion =
            self.expand_rewrite(req.clone(), base, Arc::clone(&type_system), base_sink, true);
        let subtract_expansion = self.expand_rewrite(
            req.clone(),
            subtract,
            Arc::clone(&type_system),
            subtract_sink,
            true,
        );
        let base_drainer = async move {
            let mut found = HashSet::new();
            while let Some(user) = base_users.recv().await {
                found.insert(user.to_string());
            }
            found
        };
        let subtract_drainer = async move {
            let mut found = HashSet::new();
            while let Some(user) = subtract_users.recv().await {
                found.insert(user.to_string());
            }
            found
        };

        let (base_result, subtract_result, base_found, subtract_found) = tokio::join!(
            base_expansion,
            subtract_expansion,
            base_drainer,
            subtract_drainer
        );
        match (base_result, subtract_result) {
            (Err(base_err), Err(subtract_err)) => {
                return Err(DomainError::Multiple(vec![base_err, subtract_err]))
            }
            (Err(err), Ok(())) | (Ok(()), Err(err)) => return Err(err),
            (Ok(()), Ok(())) => {}
        }

        let wildcard_key = typed_public_wildcard(&req.primary_filter().user_type);
        if subtract_found.contains(&wildcard_key) {
            return Ok(());
        }
        for key in base_found.difference(&subtract_found) {
            self.send(&sink, UserResult::parse(key)?).await?;
        }
        Ok(())
    }

    async fn send(&self, sink: &UserSink, user: UserResult) -> DomainResult<()> {
        sink.send(user)
            .await
            .map_err(|_| DomainError::ResolverError {
                message: "found-users channel closed before expansion completed".to_string(),
            })
    }
}
