use fhir_store_core::error::{ConcurrencyError, ErrorKind, StorageError};
use fhir_store_core::indexer::{ColumnValue, RowIndexer, SimplePathEvaluator};
use fhir_store_core::repository::postgres::check_row_updatable;
use fhir_store_core::{ProjectId, RequestContext};
use serde_json::json;
use uuid::Uuid;

use crate::common::fixtures::registries;

/// An `ifMatch` mismatch maps to `VersionConflict`, the kind
/// `update_resource` returns when the caller's expected `versionId` does
/// not match the row it locked.
#[test]
fn if_match_mismatch_maps_to_version_conflict_kind() {
    let err: StorageError = ConcurrencyError::VersionConflict {
        resource_type: "Patient".to_string(),
        id: Uuid::new_v4().to_string(),
        expected: Uuid::new_v4().to_string(),
        actual: Uuid::new_v4().to_string(),
    }
    .into();
    assert_eq!(err.kind(), ErrorKind::VersionConflict);
}

/// Re-indexing a document after an update changes exactly the columns the
/// update touched, leaving the rest stable — the shape `update_resource`
/// relies on when it recomputes `main_columns` before its `UPDATE`.
#[test]
fn updating_a_field_changes_only_its_column() {
    let registries = registries();
    let evaluator = SimplePathEvaluator;
    let indexer = RowIndexer::new(&registries, &evaluator);

    let before = json!({
        "resourceType": "Patient",
        "name": [{"family": "Conti"}],
        "birthDate": "1979-11-03"
    });
    let after = json!({
        "resourceType": "Patient",
        "name": [{"family": "Russo"}],
        "birthDate": "1979-11-03"
    });

    let indexed_before = indexer.index("Patient", &before).unwrap();
    let indexed_after = indexer.index("Patient", &after).unwrap();

    assert_eq!(
        indexed_before.main_columns.get("birthdate"),
        indexed_after.main_columns.get("birthdate")
    );
    assert_eq!(
        indexed_after.main_columns.get("family"),
        Some(&ColumnValue::Text("Russo".to_string()))
    );
    assert_ne!(
        indexed_before.main_columns.get("family"),
        indexed_after.main_columns.get("family")
    );
}

/// Updating a resource created under project A using a project-B context
/// fails as `ResourceNotFound`, not silently succeeding against another
/// tenant's row. This is the row-lock visibility check `update_resource`
/// runs before recomputing `next_version`.
#[test]
fn updating_a_resource_from_another_project_is_not_found() {
    let project_a = ProjectId::new();
    let project_b = ProjectId::new();
    let ctx_b = RequestContext::new(project_b);

    let row_id = Uuid::new_v4();
    let err = check_row_updatable(&ctx_b, "Patient", row_id, project_a.as_uuid(), false)
        .expect_err("project B must not see project A's row");

    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
}

/// Updating a tombstoned id fails as `ResourceGone` rather than silently
/// resurrecting it at the next version — a concurrent delete must make the
/// racing update the loser.
#[test]
fn updating_a_tombstoned_resource_is_gone_not_resurrected() {
    let project = ProjectId::new();
    let ctx = RequestContext::new(project);
    let row_id = Uuid::new_v4();

    let err = check_row_updatable(&ctx, "Patient", row_id, project.as_uuid(), true)
        .expect_err("a tombstoned row must not be updatable");

    assert_eq!(err.kind(), ErrorKind::ResourceGone);
}

/// The same row, visible and live, is updatable — the positive case the two
/// negative tests above are contrasted against.
#[test]
fn updating_a_visible_live_resource_in_the_same_project_succeeds() {
    let project = ProjectId::new();
    let ctx = RequestContext::new(project);
    let row_id = Uuid::new_v4();

    assert!(check_row_updatable(&ctx, "Patient", row_id, project.as_uuid(), false).is_ok());
}
