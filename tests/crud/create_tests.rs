use chrono::Utc;
use fhir_store_core::indexer::{ColumnValue, RowIndexer, SimplePathEvaluator};
use fhir_store_core::planner::plan_table_set;
use fhir_store_core::repository::StoredResource;
use serde_json::json;
use uuid::Uuid;

use crate::common::fixtures::registries;

/// Plans the `Patient` table set the way the repository's `create_resource`
/// assumes exists, and checks the columns a `family`/`identifier`/
/// `birthdate` search parameter set produces.
#[test]
fn planning_patient_yields_expected_main_columns() {
    let registries = registries();
    let params = registries.search_params().for_resource_type("Patient");
    let table_set = plan_table_set("Patient", &params).unwrap();

    let column_names: Vec<&str> = table_set.main.columns.iter().map(|c| c.name.as_str()).collect();
    assert!(column_names.contains(&"family"));
    assert!(column_names.contains(&"__identifier"));
    assert!(column_names.contains(&"__identifierText"));
    assert!(column_names.contains(&"__identifierSort"));
    assert!(column_names.contains(&"birthdate"));
    assert!(column_names.contains(&"id"));
    assert_eq!(table_set.main.primary_key, vec!["id".to_string()]);
}

/// Indexing a new `Patient` document produces the column values
/// `create_resource` would bind into the INSERT, including the token
/// triplet for `identifier`.
#[tokio::test]
async fn indexing_a_new_patient_produces_bindable_columns() {
    let registries = registries();
    let evaluator = SimplePathEvaluator;
    let indexer = RowIndexer::new(&registries, &evaluator);

    let doc = json!({
        "resourceType": "Patient",
        "name": [{"family": "Alonso"}],
        "identifier": [{"system": "http://example.org/mrn", "code": "12345"}],
        "birthDate": "1990-05-01"
    });

    let indexed = indexer.index("Patient", &doc).unwrap();
    assert_eq!(
        indexed.main_columns.get("family"),
        Some(&ColumnValue::Text("Alonso".to_string()))
    );
    assert!(matches!(
        indexed.main_columns.get("__identifierText"),
        Some(ColumnValue::TextArray(v)) if v == &vec!["http://example.org/mrn|12345".to_string()]
    ));
    assert!(indexed.main_columns.contains_key("birthdate"));
    assert!(indexed.references.is_empty());
    assert!(indexed.compartments.is_empty());
}

/// Creating an `Observation` that references a `Patient` both emits a
/// reference row for `subject`/`patient` and adds the patient to the
/// computed compartment set, independent of which search parameter code
/// matched the reference.
#[tokio::test]
async fn indexing_an_observation_with_subject_emits_reference_and_compartment() {
    let registries = registries();
    let evaluator = SimplePathEvaluator;
    let indexer = RowIndexer::new(&registries, &evaluator);

    let patient_id = Uuid::new_v4();
    let doc = json!({
        "resourceType": "Observation",
        "status": "final",
        "code": {"coding": [{"system": "http://loinc.org", "code": "8480-6"}]},
        "subject": {"reference": format!("Patient/{patient_id}")}
    });

    let indexed = indexer.index("Observation", &doc).unwrap();
    assert_eq!(indexed.compartments, vec![patient_id]);
    // Two search parameters ("subject" and "patient") both resolve to
    // Observation.subject, so the reference is emitted twice, once per code.
    assert_eq!(indexed.references.len(), 2);
    assert!(indexed.references.iter().all(|r| r.target_id == patient_id));
}

/// A freshly created resource's `StoredResource` always starts at version 1
/// with `deleted = false`, matching §4.3's creation step.
#[test]
fn a_new_stored_resource_starts_at_version_one() {
    let resource = StoredResource {
        resource_type: "Patient".to_string(),
        id: Uuid::new_v4(),
        version_id: Uuid::new_v4(),
        version: 1,
        content: json!({"resourceType": "Patient"}),
        last_updated: Utc::now(),
        deleted: false,
    };
    assert_eq!(resource.version, 1);
    assert!(!resource.deleted);
}
