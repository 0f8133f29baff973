use fhir_store_core::repository::SqlParam;
use fhir_store_core::search::{parse_search_request, SearchCompiler};

use crate::common::fixtures::registries;

/// A plain reference search compares the stored reference column against
/// the literal value — the compiler does not resolve or validate the
/// target, only binds the string.
#[test]
fn plain_reference_value_is_bound_as_text() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let request =
        parse_search_request("Observation", &[("subject".into(), "Patient/abc".into())]).unwrap();
    let (compiled, _) = compiler.compile(&request, false).unwrap();
    match &compiled.predicate.params[0] {
        SqlParam::Text(text) => assert_eq!(text, "Patient/abc"),
        other => panic!("expected a bound reference text value, got {other:?}"),
    }
}

/// `subject` and `patient` are declared against the same underlying
/// expression (§4.2's discovered indexer behavior); the compiler treats
/// them as two independent columns regardless, since each carries its own
/// canonical search parameter entry.
#[test]
fn subject_and_patient_compile_independently() {
    let registries = registries();
    let compiler = SearchCompiler::new(&registries);
    let subject = parse_search_request("Observation", &[("subject".into(), "Patient/1".into())])
        .unwrap();
    let patient = parse_search_request("Observation", &[("patient".into(), "Patient/1".into())])
        .unwrap();
    let (subject_compiled, _) = compiler.compile(&subject, false).unwrap();
    let (patient_compiled, _) = compiler.compile(&patient, false).unwrap();
    assert!(subject_compiled.predicate.sql.contains("subject"));
    assert!(patient_compiled.predicate.sql.contains("patient"));
}
