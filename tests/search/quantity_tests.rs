use fhir_store_core::search::{parse_search_request, SearchCompiler};

use crate::common::fixtures::registries;

/// `value-quantity` is declared `Quantity`, not `Number`, but shares the
/// same numeric comparison machinery — both types route through
/// `number_condition`.
#[test]
fn quantity_search_parameter_shares_numeric_comparison_machinery() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Observation", &[("value-quantity".into(), "ge5.0".into())]).unwrap();
    let (compiled, warnings) = compiler.compile(&request, false).unwrap();
    assert!(warnings.is_empty());
    assert!(compiled.predicate.sql.contains(">="));
}

/// Multiple comma-joined quantity bounds combine with OR, not AND — a
/// caller wanting a closed range expresses it as two separate parameter
/// occurrences rather than one comma-joined value.
#[test]
fn comma_joined_quantity_bounds_combine_with_or() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Observation", &[("value-quantity".into(), "ge5,le1".into())])
            .unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    assert!(compiled.predicate.sql.contains(" OR "));
    assert_eq!(compiled.predicate.params.len(), 2);
}
