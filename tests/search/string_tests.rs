use fhir_store_core::repository::SqlParam;
use fhir_store_core::search::{parse_search_request, SearchCompiler};

use crate::common::fixtures::registries;

/// Plain string search is a prefix match, case-insensitively.
#[test]
fn plain_string_value_is_a_prefix_match() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request = parse_search_request("Patient", &[("family".into(), "Smi".into())]).unwrap();
    let (compiled, warnings) = compiler.compile(&request, false).unwrap();
    assert!(warnings.is_empty());
    assert!(compiled.predicate.sql.contains("LIKE"));
    match &compiled.predicate.params[0] {
        SqlParam::Text(text) => assert_eq!(text, "Smi%"),
        other => panic!("expected a bound text prefix, got {other:?}"),
    }
}

/// `:exact` binds the raw value with no wildcard and compares with `=`.
#[test]
fn exact_modifier_binds_the_unwildcarded_value() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Patient", &[("family:exact".into(), "Smith".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert!(compiled.predicate.sql.contains('='));
    assert!(!compiled.predicate.sql.contains("LIKE"));
    match &compiled.predicate.params[0] {
        SqlParam::Text(text) => assert_eq!(text, "Smith"),
        other => panic!("expected a bound exact text value, got {other:?}"),
    }
}

/// `:contains` wraps the value on both sides and escapes LIKE metacharacters
/// present in the input so they can't widen the match.
#[test]
fn contains_modifier_wraps_the_value_and_escapes_like_metacharacters() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Patient", &[("family:contains".into(), "50%_off".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    match &compiled.predicate.params[0] {
        SqlParam::Text(text) => assert_eq!(text, "%50\\%\\_off%"),
        other => panic!("expected a bound contains pattern, got {other:?}"),
    }
}

/// `:missing=true` asks for the column being null rather than any value
/// comparison.
#[test]
fn missing_true_checks_for_a_null_column() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Patient", &[("family:missing".into(), "true".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert!(compiled.predicate.sql.contains("IS NULL"));
    assert!(compiled.predicate.params.is_empty());
}

/// Comma-joined values within one parameter compile to an OR.
#[test]
fn comma_joined_values_compile_to_an_or() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Patient", &[("family".into(), "Smith,Jones".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert_eq!(compiled.predicate.params.len(), 2);
    assert!(compiled.predicate.sql.contains(" OR "));
}
