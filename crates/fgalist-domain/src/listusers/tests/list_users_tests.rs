//! Unit tests for the ListUsers expansion.

use std::sync::Arc;

use proptest::prelude::*;

use super::mocks::*;
use crate::error::DomainError;
use crate::listusers::{
    ListUsersConfig, ListUsersQuery, ListUsersRequest, ListUsersResult, UserFilter, UserResult,
};
use crate::model::{Object, Tuple, TypeDefinition, Userset};

fn sorted(result: &ListUsersResult) -> Vec<String> {
    let mut keys: Vec<String> = result.users.iter().map(|u| u.to_string()).collect();
    keys.sort();
    keys
}

/// Seeds the scenario tuples: alice and the public wildcard are viewers,
/// bob is an editor.
async fn seed_document(reader: &MockTupleReader) {
    reader
        .add_tuple("store-1", "user:alice", "viewer", "document:1")
        .await;
    reader
        .add_tuple("store-1", "user:*", "viewer", "document:1")
        .await;
    reader
        .add_tuple("store-1", "user:bob", "editor", "document:1")
        .await;
}

fn document_request(relation: &str) -> ListUsersRequest {
    ListUsersRequest::new(
        "store-1",
        Object::new("document", "1"),
        relation,
        vec![UserFilter::new("user")],
    )
}

// ========== Direct relations and wildcards ==========

#[tokio::test]
async fn test_direct_viewer_returns_users_and_wildcard() {
    let reader = Arc::new(MockTupleReader::new());
    seed_document(&reader).await;
    let query = query_with(document_model(), Arc::clone(&reader));

    let result = query.list_users(&document_request("viewer")).await.unwrap();

    assert_eq!(sorted(&result), vec!["user:*", "user:alice"]);
}

#[tokio::test]
async fn test_direct_returns_empty_for_no_matches() {
    let reader = Arc::new(MockTupleReader::new());
    let query = query_with(document_model(), Arc::clone(&reader));

    let result = query.list_users(&document_request("viewer")).await.unwrap();

    assert!(result.users.is_empty());
}

#[tokio::test]
async fn test_userset_subject_expands_members() {
    let reader = Arc::new(MockTupleReader::new());
    reader
        .add_tuple("store-1", "group:eng#member", "viewer", "document:1")
        .await;
    reader
        .add_tuple("store-1", "user:carol", "member", "group:eng")
        .await;
    let query = query_with(document_model(), Arc::clone(&reader));

    let result = query.list_users(&document_request("viewer")).await.unwrap();

    assert_eq!(sorted(&result), vec!["user:carol"]);
}

#[tokio::test]
async fn test_userset_filter_returns_userset_references() {
    let reader = Arc::new(MockTupleReader::new());
    reader
        .add_tuple("store-1", "group:eng#member", "viewer", "document:1")
        .await;
    reader
        .add_tuple("store-1", "user:carol", "member", "group:eng")
        .await;
    let query = query_with(document_model(), Arc::clone(&reader));

    let request = ListUsersRequest::new(
        "store-1",
        Object::new("document", "1"),
        "viewer",
        vec![UserFilter::with_relation("group", "member")],
    );
    let result = query.list_users(&request).await.unwrap();

    assert_eq!(sorted(&result), vec!["group:eng#member"]);
}

#[tokio::test]
async fn test_plain_type_filter_matches_object_itself() {
    let reader = Arc::new(MockTupleReader::new());
    seed_document(&reader).await;
    let query = query_with(document_model(), Arc::clone(&reader));

    let request = ListUsersRequest::new(
        "store-1",
        Object::new("document", "1"),
        "viewer",
        vec![UserFilter::new("document")],
    );
    let result = query.list_users(&request).await.unwrap();

    assert_eq!(sorted(&result), vec!["document:1"]);
}

// ========== Union ==========

#[tokio::test]
async fn test_union_combines_and_dedupes_operands() {
    let reader = Arc::new(MockTupleReader::new());
    seed_document(&reader).await;
    // alice is both viewer and editor; she must appear once.
    reader
        .add_tuple("store-1", "user:alice", "editor", "document:1")
        .await;
    let query = query_with(document_model(), Arc::clone(&reader));

    let result = query
        .list_users(&document_request("can_view"))
        .await
        .unwrap();

    assert_eq!(sorted(&result), vec!["user:*", "user:alice", "user:bob"]);
}

#[tokio::test]
async fn test_breadth_limit_of_one_is_still_complete() {
    let reader = Arc::new(MockTupleReader::new());
    seed_document(&reader).await;
    let query = ListUsersQuery::with_config(
        Arc::clone(&reader),
        Arc::new(StaticTypeSystemResolver::new(document_model())),
        ListUsersConfig {
            resolve_node_breadth_limit: 1,
        },
    );

    let result = query
        .list_users(&document_request("can_view"))
        .await
        .unwrap();

    assert_eq!(sorted(&result), vec!["user:*", "user:alice", "user:bob"]);
}

// ========== Intersection ==========

#[tokio::test]
async fn test_intersection_wildcard_admits_other_operand() {
    let reader = Arc::new(MockTupleReader::new());
    seed_document(&reader).await;
    let query = query_with(document_model(), Arc::clone(&reader));

    // bob is an editor and the viewer wildcard admits him; alice is a viewer
    // but not an editor.
    let result = query
        .list_users(&document_request("restricted"))
        .await
        .unwrap();

    assert_eq!(sorted(&result), vec!["user:bob"]);
}

#[tokio::test]
async fn test_intersection_wildcard_in_every_operand() {
    let reader = Arc::new(MockTupleReader::new());
    seed_document(&reader).await;
    reader
        .add_tuple("store-1", "user:*", "editor", "document:1")
        .await;
    let query = query_with(document_model(), Arc::clone(&reader));

    // Both operands carry the wildcard: it admits everything either side
    // names, and survives itself.
    let result = query
        .list_users(&document_request("restricted"))
        .await
        .unwrap();

    assert_eq!(sorted(&result), vec!["user:*", "user:alice", "user:bob"]);
}

// ========== Exclusion ==========

#[tokio::test]
async fn test_exclusion_removes_subtract_side() {
    let reader = Arc::new(MockTupleReader::new());
    seed_document(&reader).await;
    let query = query_with(document_model(), Arc::clone(&reader));

    let result = query
        .list_users(&document_request("only_viewer"))
        .await
        .unwrap();

    assert_eq!(sorted(&result), vec!["user:*", "user:alice"]);
}

#[tokio::test]
async fn test_exclusion_subtract_wildcard_empties_result() {
    let reader = Arc::new(MockTupleReader::new());
    seed_document(&reader).await;
    reader
        .add_tuple("store-1", "user:*", "editor", "document:1")
        .await;
    let query = query_with(document_model(), Arc::clone(&reader));

    let result = query
        .list_users(&document_request("only_viewer"))
        .await
        .unwrap();

    assert!(result.users.is_empty());
}

// ========== Computed usersets and tuple-to-userset ==========

#[tokio::test]
async fn test_ttu_resolves_computed_relation_on_parent() {
    let reader = Arc::new(MockTupleReader::new());
    reader
        .add_tuple("store-1", "folder:root", "parent", "document:1")
        .await;
    reader
        .add_tuple("store-1", "user:dave", "viewer", "folder:root")
        .await;
    let query = query_with(document_model(), Arc::clone(&reader));

    let result = query
        .list_users(&document_request("parent_viewer"))
        .await
        .unwrap();

    assert_eq!(sorted(&result), vec!["user:dave"]);
}

// ========== Contextual tuples ==========

#[tokio::test]
async fn test_contextual_tuples_augment_store() {
    let reader = Arc::new(MockTupleReader::new());
    seed_document(&reader).await;
    let query = query_with(document_model(), Arc::clone(&reader));

    let without = query.list_users(&document_request("viewer")).await.unwrap();

    let request = document_request("viewer").with_contextual_tuples(vec![Tuple::new(
        "user:carol",
        "viewer",
        "document:1",
    )]);
    let with = query.list_users(&request).await.unwrap();

    assert_eq!(sorted(&with), vec!["user:*", "user:alice", "user:carol"]);
    // Granting access contextually never removes a user.
    for user in &without.users {
        assert!(with.users.contains(user));
    }
}

#[tokio::test]
async fn test_contextual_tuples_respect_schema_filter() {
    let reader = Arc::new(MockTupleReader::new());
    let query = query_with(document_model(), Arc::clone(&reader));

    // editor does not admit group#member subjects; the contextual tuple is
    // silently dropped rather than failing the request.
    let request = ListUsersRequest::new(
        "store-1",
        Object::new("document", "1"),
        "editor",
        vec![UserFilter::new("user")],
    )
    .with_contextual_tuples(vec![Tuple::new(
        "group:eng#member",
        "editor",
        "document:1",
    )]);
    let result = query.list_users(&request).await.unwrap();

    assert!(result.users.is_empty());
}

// ========== Filter gating across intersection/exclusion ==========

#[tokio::test]
async fn test_userset_filter_gated_past_intersection() {
    let model = crate::model::AuthorizationModel::with_types(
        "1.1",
        vec![
            TypeDefinition {
                type_name: "user".to_string(),
                relations: vec![],
            },
            TypeDefinition {
                type_name: "repo".to_string(),
                relations: vec![
                    relation("a", &["user"], Userset::This),
                    relation("b", &["user"], Userset::This),
                    relation(
                        "c",
                        &[],
                        Userset::Intersection {
                            children: vec![computed("a"), computed("b")],
                        },
                    ),
                ],
            },
        ],
    );
    let reader = Arc::new(MockTupleReader::new());
    let query = query_with(model, Arc::clone(&reader));

    // repo:1 is not known to satisfy `a and b` for relation a, so repo:1#a
    // must not be emitted.
    let request = ListUsersRequest::new(
        "store-1",
        Object::new("repo", "1"),
        "c",
        vec![UserFilter::with_relation("repo", "a")],
    );
    let result = query.list_users(&request).await.unwrap();
    assert!(result.users.is_empty());

    // The root relation itself still matches before any operand is entered.
    let request = ListUsersRequest::new(
        "store-1",
        Object::new("repo", "1"),
        "c",
        vec![UserFilter::with_relation("repo", "c")],
    );
    let result = query.list_users(&request).await.unwrap();
    assert_eq!(sorted(&result), vec!["repo:1#c"]);
}

// ========== Cycle safety ==========

#[tokio::test]
async fn test_self_loop_terminates_empty() {
    let reader = Arc::new(MockTupleReader::new());
    seed_document(&reader).await;
    let query = query_with(document_model(), Arc::clone(&reader));

    let result = query
        .list_users(&document_request("self_loop"))
        .await
        .unwrap();

    assert!(result.users.is_empty());
}

#[tokio::test]
async fn test_cyclic_union_terminates_with_results() {
    let mut model = document_model();
    // recursive_viewer: recursive_viewer or viewer
    let doc = model
        .type_definitions
        .iter_mut()
        .find(|td| td.type_name == "document")
        .unwrap();
    doc.relations.push(relation(
        "recursive_viewer",
        &[],
        Userset::Union {
            children: vec![computed("recursive_viewer"), computed("viewer")],
        },
    ));

    let reader = Arc::new(MockTupleReader::new());
    seed_document(&reader).await;
    let query = query_with(model, Arc::clone(&reader));

    let result = query
        .list_users(&document_request("recursive_viewer"))
        .await
        .unwrap();

    assert_eq!(sorted(&result), vec!["user:*", "user:alice"]);
}

// ========== Entrypoint pre-check ==========

#[tokio::test]
async fn test_entrypoint_unreachable_skips_reads() {
    let reader = Arc::new(MockTupleReader::new());
    seed_document(&reader).await;
    let query = query_with(document_model(), Arc::clone(&reader));

    // No path connects document#viewer to subjects of type folder.
    let request = ListUsersRequest::new(
        "store-1",
        Object::new("document", "1"),
        "viewer",
        vec![UserFilter::new("folder")],
    );
    let result = query.list_users(&request).await.unwrap();

    assert!(result.users.is_empty());
    assert_eq!(reader.read_count(), 0);
}

// ========== Error handling ==========

#[tokio::test]
async fn test_reader_error_fails_request() {
    let query = query_with(document_model(), Arc::new(FailingTupleReader));

    let result = query.list_users(&document_request("viewer")).await;

    assert!(matches!(
        result.unwrap_err(),
        DomainError::StorageOperationFailed { .. }
    ));
}

#[tokio::test]
async fn test_exclusion_combines_errors_from_both_sides() {
    let query = query_with(document_model(), Arc::new(FailingTupleReader));

    let result = query.list_users(&document_request("only_viewer")).await;

    match result.unwrap_err() {
        DomainError::Multiple(errors) => assert_eq!(errors.len(), 2),
        other => panic!("expected combined errors, got: {other}"),
    }
}

#[tokio::test]
async fn test_unknown_relation_is_model_error() {
    let reader = Arc::new(MockTupleReader::new());
    let query = query_with(document_model(), Arc::clone(&reader));

    let result = query.list_users(&document_request("nonexistent")).await;

    assert!(matches!(
        result.unwrap_err(),
        DomainError::RelationNotFound { .. }
    ));
}

#[tokio::test]
async fn test_empty_filters_rejected() {
    let reader = Arc::new(MockTupleReader::new());
    let query = query_with(document_model(), Arc::clone(&reader));

    let request = ListUsersRequest::new("store-1", Object::new("document", "1"), "viewer", vec![]);
    let result = query.list_users(&request).await;

    assert!(matches!(
        result.unwrap_err(),
        DomainError::InvalidFilter { .. }
    ));
}

// ========== Set-level properties ==========

#[tokio::test]
async fn test_repeated_evaluation_yields_same_set() {
    let reader = Arc::new(MockTupleReader::new());
    seed_document(&reader).await;
    reader
        .add_tuple("store-1", "group:eng#member", "viewer", "document:1")
        .await;
    reader
        .add_tuple("store-1", "user:carol", "member", "group:eng")
        .await;
    let query = query_with(document_model(), Arc::clone(&reader));

    let first = sorted(&query.list_users(&document_request("can_view")).await.unwrap());
    for _ in 0..4 {
        let again = sorted(&query.list_users(&document_request("can_view")).await.unwrap());
        assert_eq!(again, first);
    }
}

#[tokio::test]
async fn test_every_result_matches_a_filter() {
    let reader = Arc::new(MockTupleReader::new());
    seed_document(&reader).await;
    reader
        .add_tuple("store-1", "group:eng#member", "viewer", "document:1")
        .await;
    reader
        .add_tuple("store-1", "user:carol", "member", "group:eng")
        .await;
    let query = query_with(document_model(), Arc::clone(&reader));

    let request = ListUsersRequest::new(
        "store-1",
        Object::new("document", "1"),
        "viewer",
        vec![
            UserFilter::new("user"),
            UserFilter::with_relation("group", "member"),
        ],
    );
    let result = query.list_users(&request).await.unwrap();

    assert!(!result.users.is_empty());
    for user in &result.users {
        let matches = match user {
            UserResult::Object { user_type, .. } | UserResult::Wildcard { user_type } => {
                user_type == "user"
            }
            UserResult::Userset {
                user_type,
                relation,
                ..
            } => user_type == "group" && relation == "member",
        };
        assert!(matches, "unexpected subject in result: {user}");
    }
}

// ========== Robustness ==========

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// ListUsers never panics, whatever the request shape.
    #[test]
    fn prop_list_users_never_panics(
        object_type in "[a-z]{1,8}",
        object_id in "[a-z0-9]{1,8}",
        relation in "[a-z]{1,8}",
        filter_type in "[a-z]{1,8}",
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let reader = Arc::new(MockTupleReader::new());
            let query = query_with(document_model(), Arc::clone(&reader));
            let request = ListUsersRequest::new(
                "store-1",
                Object::new(object_type.clone(), object_id.clone()),
                relation.clone(),
                vec![UserFilter::new(filter_type.clone())],
            );
            // Any outcome is fine as long as it is a Result, not a panic.
            let _ = query.list_users(&request).await;
        });
    }
}
