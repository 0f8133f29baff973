use fhir_store_core::repository::SqlParam;
use fhir_store_core::search::{parse_search_request, SearchCompiler};

use crate::common::fixtures::registries;

/// An unprefixed numeric value on a quantity parameter compiles to a plain
/// equality comparison bound as a `Numeric` parameter.
#[test]
fn unprefixed_quantity_value_compiles_to_equality() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Observation", &[("value-quantity".into(), "5.4".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert!(compiled.predicate.sql.contains('='));
    match &compiled.predicate.params[0] {
        SqlParam::Numeric(value) => assert_eq!(value.to_string(), "5.4"),
        other => panic!("expected a bound numeric value, got {other:?}"),
    }
}

/// `gt`/`lt` prefixes compile to their matching comparison operators.
#[test]
fn gt_and_lt_prefixes_compile_to_their_operators() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request = parse_search_request(
        "Observation",
        &[("value-quantity".into(), "gt5,lt10".into())],
    )
    .unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert!(compiled.predicate.sql.contains('>'));
    assert!(compiled.predicate.sql.contains('<'));
    assert_eq!(compiled.predicate.params.len(), 2);
}

/// `ap` widens a numeric value into a +/-10% BETWEEN range.
#[test]
fn ap_prefix_widens_into_a_ten_percent_range() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Observation", &[("value-quantity".into(), "ap100".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert!(compiled.predicate.sql.contains("BETWEEN"));
    let bounds: Vec<String> = compiled
        .predicate
        .params
        .iter()
        .map(|p| match p {
            SqlParam::Numeric(value) => value.to_string(),
            other => panic!("expected numeric bounds, got {other:?}"),
        })
        .collect();
    assert_eq!(bounds, vec!["90.0", "110.0"]);
}

/// A non-numeric value is rejected rather than silently coerced.
#[test]
fn non_numeric_value_is_rejected() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Observation", &[("value-quantity".into(), "heavy".into())]).unwrap();
    let err = compiler.compile(&request, false).unwrap_err();
    assert!(matches!(
        err,
        fhir_store_core::error::SearchError::MalformedRequest { .. }
    ));
}
