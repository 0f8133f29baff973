use fhir_store_core::error::{ErrorKind, ResourceError, StorageError};
use fhir_store_core::indexer::{RowIndexer, SimplePathEvaluator};
use serde_json::json;
use uuid::Uuid;

use crate::common::fixtures::registries;

/// A missing resource maps to the `ResourceNotFound` kind, the taxonomy
/// `read_resource` surfaces when no row matches the requested id.
#[test]
fn missing_resource_maps_to_not_found_kind() {
    let err: StorageError = ResourceError::NotFound {
        resource_type: "Patient".to_string(),
        id: Uuid::new_v4().to_string(),
    }
    .into();
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
}

/// A soft-deleted resource maps to `ResourceGone`, distinct from
/// `ResourceNotFound` — `read_resource` checks the `deleted` flag after
/// confirming the row exists, so the two cases are never conflated.
#[test]
fn deleted_resource_maps_to_gone_kind() {
    let err: StorageError = ResourceError::Gone {
        resource_type: "Patient".to_string(),
        id: Uuid::new_v4().to_string(),
    }
    .into();
    assert_eq!(err.kind(), ErrorKind::ResourceGone);
}

/// Indexing the same document twice (as happens when re-deriving columns
/// for a read-modify-write cycle) is pure: the same document always
/// produces the same indexed row.
#[test]
fn reindexing_a_read_document_is_stable() {
    let registries = registries();
    let evaluator = SimplePathEvaluator;
    let indexer = RowIndexer::new(&registries, &evaluator);
    let doc = json!({
        "resourceType": "Patient",
        "name": [{"family": "Bianchi"}],
        "birthDate": "1985-02-14"
    });
    let first = indexer.index("Patient", &doc).unwrap();
    let second = indexer.index("Patient", &doc).unwrap();
    assert_eq!(first, second);
}
