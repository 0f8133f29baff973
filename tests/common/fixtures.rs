use fhir_store_core::registry::{
    CanonicalSearchParameter, IndexStrategy, ProfileRegistry, Registries, SearchParamRegistry,
    SearchParamType,
};

/// A registry bundle covering the handful of search parameters these tests
/// exercise on `Patient` and `Observation`. Deliberately small: enough to
/// cover every `SearchParamType`/`IndexStrategy` combination once, not a
/// full conformance package.
pub fn registries() -> Registries {
    let params = vec![
        param(
            "Patient",
            "family",
            SearchParamType::String,
            "Patient.name.family",
            IndexStrategy::ScalarColumn,
            false,
        ),
        param(
            "Patient",
            "identifier",
            SearchParamType::Token,
            "Patient.identifier",
            IndexStrategy::TokenColumn,
            false,
        ),
        param(
            "Patient",
            "birthdate",
            SearchParamType::Date,
            "Patient.birthDate",
            IndexStrategy::ScalarColumn,
            false,
        ),
        param(
            "Observation",
            "code",
            SearchParamType::Token,
            "Observation.code.coding",
            IndexStrategy::TokenColumn,
            false,
        ),
        param(
            "Observation",
            "status",
            SearchParamType::Token,
            "Observation.status",
            IndexStrategy::TokenColumn,
            false,
        ),
        param(
            "Observation",
            "subject",
            SearchParamType::Reference,
            "Observation.subject",
            IndexStrategy::ScalarColumn,
            true,
        ),
        param(
            "Observation",
            "patient",
            SearchParamType::Reference,
            "Observation.subject",
            IndexStrategy::ScalarColumn,
            true,
        ),
        param(
            "Observation",
            "date",
            SearchParamType::Date,
            "Observation.effectiveDateTime",
            IndexStrategy::ScalarColumn,
            false,
        ),
        param(
            "Observation",
            "value-quantity",
            SearchParamType::Quantity,
            "Observation.valueQuantity",
            IndexStrategy::ScalarColumn,
            false,
        ),
    ];

    Registries::build(ProfileRegistry::default(), SearchParamRegistry::build(params))
}

fn param(
    resource_type: &str,
    code: &str,
    param_type: SearchParamType,
    expression: &str,
    strategy: IndexStrategy,
    compartment_defining: bool,
) -> CanonicalSearchParameter {
    CanonicalSearchParameter {
        resource_type: resource_type.to_string(),
        code: code.to_string(),
        param_type,
        expression: expression.to_string(),
        strategy,
        compartment_defining,
    }
}
