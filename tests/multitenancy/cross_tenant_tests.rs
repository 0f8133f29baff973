use fhir_store_core::error::{ErrorKind, StorageError, TenantError};
use fhir_store_core::repository::postgres::{check_row_updatable, check_row_visible};
use fhir_store_core::{ProjectId, RequestContext};
use uuid::Uuid;

/// A super-admin context bypasses project scoping entirely, seeing every
/// project — the one escape hatch §4.3 allows from the single-tenant-axis
/// rule.
#[test]
fn super_admin_sees_across_every_project() {
    let a = ProjectId::new();
    let b = ProjectId::new();
    let ctx = RequestContext::super_admin(a);
    assert!(ctx.super_admin);
    assert!(ctx.can_see(a));
    assert!(ctx.can_see(b));
}

/// A resource belonging to another project surfaces as `TenantError::NotVisible`,
/// which the taxonomy classifies alongside `ResourceNotFound` — callers
/// should not be able to distinguish "doesn't exist" from "exists in
/// another tenant" by error kind alone.
#[test]
fn cross_tenant_read_maps_to_not_found_kind() {
    let err: StorageError = TenantError::NotVisible {
        project: ProjectId::new(),
        resource_type: "Patient".to_string(),
        id: "123".to_string(),
    }
    .into();
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
}

/// The write paths apply the identical tenant-visibility rule the read paths
/// do: a resource created under project A, row-locked for update or delete
/// under a project-B context, is not found rather than mutated — a caller in
/// one tenant cannot reach into another tenant's data through a write.
#[test]
fn cross_tenant_update_and_delete_are_not_found_not_mutated() {
    let project_a = ProjectId::new();
    let project_b = ProjectId::new();
    let ctx_b = RequestContext::new(project_b);
    let row_id = Uuid::new_v4();

    let update_err = check_row_updatable(&ctx_b, "Patient", row_id, project_a.as_uuid(), false)
        .expect_err("project B must not be able to update project A's row");
    assert_eq!(update_err.kind(), ErrorKind::ResourceNotFound);

    let delete_err = check_row_visible(&ctx_b, "Patient", row_id, project_a.as_uuid())
        .expect_err("project B must not be able to delete project A's row");
    assert_eq!(delete_err.kind(), ErrorKind::ResourceNotFound);
}

/// Racing a delete against an update on the same row: the update must lose
/// with `ResourceGone` once the row is a tombstone, never silently resurrect
/// it at the next version.
#[test]
fn update_racing_a_delete_sees_resource_gone() {
    let project = ProjectId::new();
    let ctx = RequestContext::new(project);
    let row_id = Uuid::new_v4();

    let err = check_row_updatable(&ctx, "Patient", row_id, project.as_uuid(), true)
        .expect_err("an update racing a delete must see the tombstone, not resurrect it");
    assert_eq!(err.kind(), ErrorKind::ResourceGone);
}
