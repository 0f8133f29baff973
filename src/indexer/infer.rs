use serde_json::Value;

/// The FHIR type tag produced by type inference, used both by the indexer
/// (to pick a value transform) and by the validator (to check type
/// assignability).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FhirType {
    String,
    Boolean,
    Integer,
    Decimal,
    Date,
    DateTime,
    Instant,
    Time,
    Uri,
    Coding,
    CodeableConcept,
    Quantity,
    Reference,
    Period,
    Ratio,
    HumanName,
    Address,
    Identifier,
    Extension,
    BackboneElement,
}

/// Infers a [`FhirType`] for a schemaless value using the deterministic
/// shape ladder from §4.2. Order matters: each arm is tried in sequence
/// and the first match wins.
pub fn infer_type(value: &Value) -> FhirType {
    match value {
        Value::String(_) => FhirType::String,
        Value::Bool(_) => FhirType::Boolean,
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                FhirType::Integer
            } else {
                FhirType::Decimal
            }
        }
        Value::Object(map) => infer_object_type(map),
        _ => FhirType::BackboneElement,
    }
}

fn infer_object_type(map: &serde_json::Map<String, Value>) -> FhirType {
    let has = |k: &str| map.contains_key(k);

    if has("system") && has("code") && !has("value") {
        return FhirType::Coding;
    }
    if has("coding") {
        return FhirType::CodeableConcept;
    }
    if (has("value") && has("unit")) || (has("value") && has("system") && has("code")) {
        return FhirType::Quantity;
    }
    if has("reference") {
        return FhirType::Reference;
    }
    if has("start") && !has("value") {
        return FhirType::Period;
    }
    if has("numerator") && has("denominator") {
        return FhirType::Ratio;
    }
    if has("family") || has("given") {
        return FhirType::HumanName;
    }
    if has("line") || (has("city") && !has("system")) {
        return FhirType::Address;
    }
    if has("system") && has("value") && !has("code") {
        return FhirType::Identifier;
    }
    if has("url") && (map.len() > 1 || has("extension")) {
        return FhirType::Extension;
    }
    FhirType::BackboneElement
}
