use fhir_store_core::error::{ConcurrencyError, ErrorKind, StorageError};

/// `VersionConflict` carries the expected and actual `versionId`s so a
/// caller can render a precise `412 Precondition Failed` body; it maps to
/// the `VersionConflict` taxonomy kind.
#[test]
fn version_conflict_carries_expected_and_actual_versions() {
    let err = ConcurrencyError::VersionConflict {
        resource_type: "Patient".to_string(),
        id: "abc".to_string(),
        expected: "v1".to_string(),
        actual: "v2".to_string(),
    };
    let message = err.to_string();
    assert!(message.contains("expected v1"));
    assert!(message.contains("found v2"));

    let err: StorageError = err.into();
    assert_eq!(err.kind(), ErrorKind::VersionConflict);
}

/// A duplicate `versionId` (a history row already exists for the id the
/// update path just generated) is an internal invariant violation, not a
/// caller-facing conflict — it maps to `InternalError`, not
/// `VersionConflict`.
#[test]
fn duplicate_version_is_an_internal_error_not_a_version_conflict() {
    let err: StorageError = ConcurrencyError::DuplicateVersion {
        version_id: "00000000-0000-0000-0000-000000000000".to_string(),
    }
    .into();
    assert_eq!(err.kind(), ErrorKind::InternalError);
}
