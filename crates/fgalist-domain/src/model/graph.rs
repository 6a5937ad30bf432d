//! Relationship graph over the authorization model's type definitions.
//!
//! The graph answers coarse reachability questions: can subjects of a source
//! shape `(type, relation?)` ever appear under a target `(type, relation)`?
//! It is used as an unsatisfiability pre-check only; the expansion engine is
//! correct without it, so edges may over-approximate but must never miss a
//! satisfiable pair.

use std::collections::HashSet;

use crate::error::{DomainError, DomainResult};

use super::type_system::TypeSystem;

/// A reference to a relation (or, with `relation` unset, to a bare type).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationReference {
    pub type_name: String,
    pub relation: Option<String>,
}

impl RelationReference {
    /// Creates a reference with an optional relation.
    pub fn new(type_name: impl Into<String>, relation: Option<String>) -> Self {
        Self {
            type_name: type_name.into(),
            relation,
        }
    }

    /// Creates a reference to a relation on a type.
    pub fn direct(type_name: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            relation: Some(relation.into()),
        }
    }
}

/// How a source became reachable from a walked relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipEdgeKind {
    /// The relation's direct type restrictions admit the source.
    Direct,
    /// The walked relation reference itself matches the source, so the object
    /// (or its userset) is emitted when the walk reaches it.
    ComputedUserset,
    /// A tupleset hop lands on the source relation of a parent type.
    TupleToUserset,
}

/// An edge connecting a walked relation to the source reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipEdge {
    pub kind: RelationshipEdgeKind,
    /// The relation at which the source was matched.
    pub node: RelationReference,
}

/// Reachability walker over a [`TypeSystem`].
pub struct RelationshipGraph<'a> {
    type_system: &'a TypeSystem,
}

impl<'a> RelationshipGraph<'a> {
    pub fn new(type_system: &'a TypeSystem) -> Self {
        Self { type_system }
    }

    /// Collects the edges connecting `target` to `source`, pruning operands
    /// that cannot veto membership: only the first operand of an intersection
    /// and only the base of an exclusion are descended, since a subject absent
    /// from those can never satisfy the combined expression.
    ///
    /// An empty result means no subject of the source shape can ever be
    /// related via the target relation.
    pub fn get_pruned_relationship_edges(
        &self,
        target: &RelationReference,
        source: &RelationReference,
    ) -> DomainResult<Vec<RelationshipEdge>> {
        let mut edges = Vec::new();
        let mut visited = HashSet::new();
        self.collect_edges(target, source, &mut visited, &mut edges)?;
        Ok(edges)
    }

    fn collect_edges(
        &self,
        node: &RelationReference,
        source: &RelationReference,
        visited: &mut HashSet<(String, String)>,
        edges: &mut Vec<RelationshipEdge>,
    ) -> DomainResult<()> {
        let relation = node.relation.as_deref().ok_or_else(|| {
            DomainError::GraphTraversal {
                message: format!("walked node {} has no relation", node.type_name),
            }
        })?;
        if !visited.insert((node.type_name.clone(), relation.to_string())) {
            return Ok(());
        }

        if self.node_matches_source(node, source) {
            edges.push(RelationshipEdge {
                kind: RelationshipEdgeKind::ComputedUserset,
                node: node.clone(),
            });
        }

        let relation_def = self
            .type_system
            .get_relation(&node.type_name, relation)
            .map_err(|e| DomainError::GraphTraversal {
                message: e.to_string(),
            })?;

        self.walk_rewrite(node, &relation_def, &relation_def.rewrite, source, visited, edges)
    }

    fn walk_rewrite(
        &self,
        node: &RelationReference,
        relation_def: &super::types::RelationDefinition,
        rewrite: &super::types::Userset,
        source: &RelationReference,
        visited: &mut HashSet<(String, String)>,
        edges: &mut Vec<RelationshipEdge>,
    ) -> DomainResult<()> {
        use super::types::Userset;

        match rewrite {
            Userset::This => {
                if relation_def.type_constraints.is_empty() {
                    // Unrestricted direct assignment: any subject shape may be
                    // stored here, so the source is always reachable.
                    edges.push(RelationshipEdge {
                        kind: RelationshipEdgeKind::Direct,
                        node: node.clone(),
                    });
                    return Ok(());
                }
                for constraint in &relation_def.type_constraints {
                    self.walk_constraint(node, constraint, source, visited, edges)?;
                }
                Ok(())
            }
            Userset::ComputedUserset { relation } => self.collect_edges(
                &RelationReference::direct(node.type_name.clone(), relation.clone()),
                source,
                visited,
                edges,
            ),
            Userset::TupleToUserset {
                tupleset,
                computed_userset,
            } => {
                let tupleset_def = self
                    .type_system
                    .get_relation(&node.type_name, tupleset)
                    .map_err(|e| DomainError::GraphTraversal {
                        message: e.to_string(),
                    })?;
                // Tupleset constraints name the parent object types; the
                // computed relation is resolved on each of them.
                for constraint in &tupleset_def.type_constraints {
                    let (parent_type, _) = parse_constraint(constraint);
                    let hop = RelationReference::direct(parent_type, computed_userset.clone());
                    if hop.type_name == source.type_name
                        && source.relation.as_deref() == hop.relation.as_deref()
                    {
                        edges.push(RelationshipEdge {
                            kind: RelationshipEdgeKind::TupleToUserset,
                            node: hop.clone(),
                        });
                    }
                    self.collect_edges(&hop, source, visited, edges)?;
                }
                Ok(())
            }
            Userset::Union { children } => {
                for child in children {
                    self.walk_rewrite(node, relation_def, child, source, visited, edges)?;
                }
                Ok(())
            }
            Userset::Intersection { children } => match children.first() {
                Some(first) => {
                    self.walk_rewrite(node, relation_def, first, source, visited, edges)
                }
                None => Ok(()),
            },
            Userset::Exclusion { base, .. } => {
                self.walk_rewrite(node, relation_def, base, source, visited, edges)
            }
        }
    }

    fn walk_constraint(
        &self,
        node: &RelationReference,
        constraint: &str,
        source: &RelationReference,
        visited: &mut HashSet<(String, String)>,
        edges: &mut Vec<RelationshipEdge>,
    ) -> DomainResult<()> {
        let (constraint_type, constraint_relation) = parse_constraint(constraint);

        if constraint_type == source.type_name {
            let matches = match (&constraint_relation, &source.relation) {
                (None, None) => true,
                (Some(cr), Some(sr)) => cr == sr,
                _ => false,
            };
            if matches {
                edges.push(RelationshipEdge {
                    kind: RelationshipEdgeKind::Direct,
                    node: node.clone(),
                });
            }
        }

        // A userset constraint also makes everything reachable through the
        // referenced relation reachable here.
        if let Some(cr) = constraint_relation {
            self.collect_edges(
                &RelationReference::direct(constraint_type, cr),
                source,
                visited,
                edges,
            )?;
        }
        Ok(())
    }

    /// Whether reaching `node` during expansion would emit a subject of the
    /// source shape via filter match: a plain-type source matches any visited
    /// relation on its type, a userset-shaped source matches its exact
    /// relation reference.
    fn node_matches_source(&self, node: &RelationReference, source: &RelationReference) -> bool {
        if node.type_name != source.type_name {
            return false;
        }
        match &source.relation {
            None => true,
            Some(sr) => node.relation.as_deref() == Some(sr.as_str()),
        }
    }
}

/// Parses a type constraint into `(type, relation?)`. The wildcard marker in
/// "user:*" is not a relation; it collapses to the bare type.
fn parse_constraint(constraint: &str) -> (String, Option<String>) {
    if let Some((type_name, relation)) = constraint.split_once('#') {
        return (type_name.to_string(), Some(relation.to_string()));
    }
    match constraint.split_once(':') {
        Some((type_name, _)) => (type_name.to_string(), None),
        None => (constraint.to_string(), None),
    }
}
