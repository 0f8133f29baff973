use fhir_store_core::{ProjectId, RequestContext};

/// A plain request context only sees its own project; every other project
/// is invisible, matching the single flat scoping axis §4.3 describes.
#[test]
fn a_project_scoped_context_cannot_see_another_project() {
    let mine = ProjectId::new();
    let theirs = ProjectId::new();
    let ctx = RequestContext::new(mine);
    assert!(ctx.can_see(mine));
    assert!(!ctx.can_see(theirs));
}

/// Two independently generated projects never collide.
#[test]
fn project_ids_are_distinct_by_construction() {
    let a = ProjectId::new();
    let b = ProjectId::new();
    assert_ne!(a, b);
}

/// A project id round-trips through its UUID representation, the form
/// `RequestContext`'s caller (an HTTP/auth binding) would parse it from.
#[test]
fn project_id_round_trips_through_its_uuid() {
    let id = ProjectId::new();
    let roundtripped = ProjectId::from_uuid(id.as_uuid());
    assert_eq!(id, roundtripped);
}
