use fhir_store_core::search::{parse_search_request, SearchCompiler};

use crate::common::fixtures::registries;

/// A single-level chain compiles to an EXISTS subquery joining the source
/// resource's references table against the target resource's table.
#[test]
fn single_level_chain_compiles_to_an_exists_subquery() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Observation", &[("subject.family".into(), "Smith".into())]).unwrap();
    let (compiled, warnings) = compiler.compile(&request, false).unwrap();
    assert!(warnings.is_empty());
    assert!(compiled.predicate.sql.contains("EXISTS"));
    assert!(compiled.predicate.sql.contains("JOIN"));
}

/// The chain's inner condition still binds the parameter's own code as a
/// query parameter, so the EXISTS only matches references declared under
/// that code.
#[test]
fn chain_binds_the_declaring_parameter_code() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Observation", &[("subject.family".into(), "Smith".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    let has_code_param = compiled.predicate.params.iter().any(|p| {
        matches!(p, fhir_store_core::repository::SqlParam::Text(t) if t == "subject")
    });
    assert!(has_code_param);
}

/// A two-level chain is rejected at parse time, before it ever reaches the
/// compiler.
#[test]
fn two_level_chain_is_rejected_at_parse_time() {
    let err =
        parse_search_request("Observation", &[("subject.name.family".into(), "Smith".into())])
            .unwrap_err();
    assert!(matches!(
        err,
        fhir_store_core::error::SearchError::ChainTooDeep { .. }
    ));
}

/// Chaining into an undeclared target parameter is an unknown-parameter
/// warning, same as any other unresolved code.
#[test]
fn chain_into_unknown_target_parameter_is_a_warning() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Observation", &[("subject.nonexistent".into(), "x".into())]).unwrap();
    let (_, warnings) = compiler.compile(&request, false).unwrap();
    assert_eq!(warnings.len(), 1);
}
