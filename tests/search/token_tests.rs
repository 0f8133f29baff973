use fhir_store_core::repository::SqlParam;
use fhir_store_core::search::{parse_search_request, SearchCompiler};

use crate::common::fixtures::registries;

/// `system|code` resolves to an array-overlap comparison against the
/// hashed token column.
#[test]
fn system_and_code_uses_the_hashed_array_overlap_column() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Observation", &[("code".into(), "http://loinc.org|8480-6".into())])
            .unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert!(compiled.predicate.sql.contains("&&"));
    match &compiled.predicate.params[0] {
        SqlParam::UuidArray(hashes) => assert_eq!(hashes.len(), 1),
        other => panic!("expected a bound uuid array, got {other:?}"),
    }
}

/// A bare code with no system searches the canonical text column for any
/// system paired with that code.
#[test]
fn bare_code_searches_the_canonical_text_column() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request = parse_search_request("Observation", &[("code".into(), "8480-6".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert!(compiled.predicate.sql.contains("unnest"));
    match &compiled.predicate.params[0] {
        SqlParam::Text(text) => assert_eq!(text, "%|8480-6"),
        other => panic!("expected a bound text pattern, got {other:?}"),
    }
}

/// `system|` with an empty code matches any code under that system.
#[test]
fn system_with_empty_code_matches_any_code_under_the_system() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Observation", &[("code".into(), "http://loinc.org|".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    match &compiled.predicate.params[0] {
        SqlParam::Text(text) => assert_eq!(text, "http://loinc.org|%"),
        other => panic!("expected a bound system prefix, got {other:?}"),
    }
}

/// `:text` searches the display-text sort column with a prefix ILIKE
/// instead of the exact token match.
#[test]
fn text_modifier_searches_the_sort_column() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Observation", &[("code:text".into(), "Blood Pressure".into())])
            .unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert!(compiled.predicate.sql.contains("ILIKE"));
    match &compiled.predicate.params[0] {
        SqlParam::Text(text) => assert_eq!(text, "Blood Pressure%"),
        other => panic!("expected a bound text prefix, got {other:?}"),
    }
}

/// `:not` negates the combined OR of every value in the list.
#[test]
fn not_modifier_negates_the_combined_condition() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Observation", &[("status:not".into(), "cancelled".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert!(compiled.predicate.sql.starts_with("NOT ("));
}
