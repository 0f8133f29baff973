use fhir_store_core::repository::SqlParam;
use fhir_store_core::search::{parse_search_request, SearchCompiler};

use crate::common::fixtures::registries;

/// An unprefixed date value defaults to the `eq` comparison operator.
#[test]
fn unprefixed_date_defaults_to_equality() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Patient", &[("birthdate".into(), "2020-01-01".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert!(compiled.predicate.sql.contains('='));
    assert_eq!(compiled.predicate.params.len(), 1);
}

/// `ge`/`le` prefixes compile to their matching comparison operators.
#[test]
fn ge_and_le_prefixes_compile_to_their_operators() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request = parse_search_request(
        "Observation",
        &[("date".into(), "ge2020-01-01,le2020-12-31".into())],
    )
    .unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert!(compiled.predicate.sql.contains(">="));
    assert!(compiled.predicate.sql.contains("<="));
    assert_eq!(compiled.predicate.params.len(), 2);
}

/// `ap` (approximately) widens into a BETWEEN range around the value rather
/// than a single comparison.
#[test]
fn ap_prefix_widens_into_a_between_range() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Observation", &[("date".into(), "ap2020-06-15".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert!(compiled.predicate.sql.contains("BETWEEN"));
    assert_eq!(compiled.predicate.params.len(), 2);
    for param in &compiled.predicate.params {
        assert!(matches!(param, SqlParam::TimestampTz(_)));
    }
}

/// A malformed date value is rejected rather than silently ignored.
#[test]
fn malformed_date_value_is_rejected() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Patient", &[("birthdate".into(), "not-a-date".into())]).unwrap();
    let err = compiler.compile(&request, false).unwrap_err();
    assert!(matches!(
        err,
        fhir_store_core::error::SearchError::MalformedRequest { .. }
    ));
}
