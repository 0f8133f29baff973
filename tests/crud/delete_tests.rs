use chrono::Utc;
use fhir_store_core::error::{ErrorKind, ResourceError, StorageError};
use fhir_store_core::repository::postgres::check_row_visible;
use fhir_store_core::repository::StoredResource;
use fhir_store_core::{ProjectId, RequestContext};
use serde_json::{json, Value};
use uuid::Uuid;

/// Deleting a resource that does not exist maps to `ResourceNotFound`,
/// same as a read miss — `delete_resource` locks the current row before
/// it does anything else, so a missing row fails identically to a read.
#[test]
fn deleting_a_missing_resource_maps_to_not_found_kind() {
    let err: StorageError = ResourceError::NotFound {
        resource_type: "Patient".to_string(),
        id: Uuid::new_v4().to_string(),
    }
    .into();
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
}

/// A deleted history row carries no content, matching `read_history`'s
/// convention of substituting `Value::Null` for a soft-deleted version's
/// content rather than the empty string stored on the main row.
#[test]
fn a_deleted_history_entry_carries_no_content() {
    let resource = StoredResource {
        resource_type: "Patient".to_string(),
        id: Uuid::new_v4(),
        version_id: Uuid::new_v4(),
        version: -1,
        content: Value::Null,
        last_updated: Utc::now(),
        deleted: true,
    };
    assert!(resource.deleted);
    assert_eq!(resource.content, json!(null));
}

/// Deleting a resource created under project A using a project-B context
/// fails as `ResourceNotFound` — `delete_resource`'s row lock must apply the
/// same tenant-visibility check the read paths apply, not just the missing-row
/// case above.
#[test]
fn deleting_a_resource_from_another_project_is_not_found() {
    let project_a = ProjectId::new();
    let project_b = ProjectId::new();
    let ctx_b = RequestContext::new(project_b);
    let row_id = Uuid::new_v4();

    let err = check_row_visible(&ctx_b, "Patient", row_id, project_a.as_uuid())
        .expect_err("project B must not see project A's row");

    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
}

/// A super-admin context bypasses the same check, able to delete across
/// every project — the one escape hatch from the single-tenant-axis rule.
#[test]
fn super_admin_can_delete_a_resource_in_any_project() {
    let project_a = ProjectId::new();
    let admin_ctx = RequestContext::super_admin(ProjectId::new());
    let row_id = Uuid::new_v4();

    assert!(check_row_visible(&admin_ctx, "Patient", row_id, project_a.as_uuid()).is_ok());
}
