use fhir_store_core::search::{parse_search_request, SearchCompiler};

use crate::common::fixtures::registries;

/// With no `_count`/`_offset` given, paging defaults to 20/0.
#[test]
fn defaults_to_twenty_results_with_no_offset() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request = parse_search_request("Patient", &[]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert_eq!(compiled.count, 20);
    assert_eq!(compiled.offset, 0);
}

/// A requested `_count` above the cap is clamped to 1000.
#[test]
fn count_above_the_cap_is_clamped() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request = parse_search_request("Patient", &[("_count".into(), "5000".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert_eq!(compiled.count, 1000);
}

/// `_offset` is carried through unchanged.
#[test]
fn offset_is_carried_through_unchanged() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request = parse_search_request("Patient", &[("_offset".into(), "40".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert_eq!(compiled.offset, 40);
}

/// `_sort=-_lastUpdated` compiles to a descending ORDER BY on the fixed
/// `lastUpdated` column, not a declared search parameter.
#[test]
fn sort_by_last_updated_descending_uses_the_fixed_column() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Patient", &[("_sort".into(), "-_lastUpdated".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert_eq!(compiled.order_by.len(), 1);
    assert!(compiled.order_by[0].contains("lastUpdated"));
    assert!(compiled.order_by[0].ends_with("DESC"));
}

/// `_sort` on a token parameter orders by its dedicated sort column, not
/// the hashed overlap column.
#[test]
fn sort_on_a_token_parameter_uses_the_sort_column() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request = parse_search_request("Observation", &[("_sort".into(), "code".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert_eq!(compiled.order_by.len(), 1);
    assert!(compiled.order_by[0].contains("codeSort"));
}

/// `_total=accurate` asks the repository to compute an exact count;
/// anything else leaves it out of scope for this page.
#[test]
fn total_accurate_sets_include_total() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request = parse_search_request("Patient", &[("_total".into(), "accurate".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert!(compiled.include_total);

    let request = parse_search_request("Patient", &[("_total".into(), "estimate".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert!(!compiled.include_total);
}
