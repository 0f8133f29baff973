//! Profile-driven resource validation (§4.5).
//!
//! Validation walks a [`CanonicalProfile`](crate::registry::structure::CanonicalProfile)
//! alongside the raw document, applying the fixed rule order from §4.5 at
//! every element: cardinality, type, choice-type, fixed, pattern,
//! reference-target, slicing, then declared FHIRPath constraints. Every
//! rule runs independently; `fail_fast` only controls whether the walk
//! stops at the first error rather than which rules apply.

pub mod issue;
pub mod slicing;

pub use issue::{IssueCode, ValidationIssue, ValidationSeverity};

use serde_json::Value;

use crate::indexer::fhirpath::FhirPathEvaluator;
use crate::indexer::infer::{infer_type, FhirType};
use crate::registry::structure::{CanonicalElement, CanonicalProfile, TypeRef};

/// Validates `document` against `profile`, returning every issue found.
/// An empty result means the resource is valid. When `fail_fast` is set,
/// the walk stops at the first error-severity issue (warnings never stop
/// it either way).
pub fn validate(
    profile: &CanonicalProfile,
    document: &Value,
    evaluator: &dyn FhirPathEvaluator,
    fail_fast: bool,
) -> Vec<ValidationIssue> {
    let mut ctx = Ctx {
        profile,
        evaluator,
        fail_fast,
        issues: Vec::new(),
    };

    if let Some(root) = profile.element(&profile.resource_type) {
        check_constraints(&mut ctx, root, document, &profile.resource_type);
    }

    walk_children(&mut ctx, &profile.resource_type, document);

    let errors = ctx.issues.iter().filter(|i| i.is_error()).count();
    if errors > 0 {
        tracing::warn!(
            "Validation of {} found {} error(s), {} total issue(s)",
            profile.resource_type,
            errors,
            ctx.issues.len()
        );
    } else {
        tracing::debug!("Validation of {} passed", profile.resource_type);
    }

    ctx.issues
}

struct Ctx<'a> {
    profile: &'a CanonicalProfile,
    evaluator: &'a dyn FhirPathEvaluator,
    fail_fast: bool,
    issues: Vec<ValidationIssue>,
}

impl<'a> Ctx<'a> {
    /// Records an issue; returns `false` once a `fail_fast` run should stop.
    fn push(&mut self, issue: ValidationIssue) -> bool {
        let stop = self.fail_fast && issue.is_error();
        self.issues.push(issue);
        !stop
    }
}

/// Maps a [`FhirType`] to the FHIR type name(s) it's compatible with, per
/// the assignability ladder: string-like primitives all accept `string`
/// and each other's dedicated names; integers widen to decimal; Quantity
/// widens to its specializations; `BackboneElement` (an untyped/complex
/// element) is universally permissive.
fn type_compatible(inferred: FhirType, allowed: &[TypeRef]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    allowed.iter().any(|t| is_assignable(inferred, &t.code))
}

fn is_assignable(inferred: FhirType, code: &str) -> bool {
    match inferred {
        FhirType::String | FhirType::Uri | FhirType::Date | FhirType::DateTime | FhirType::Instant | FhirType::Time => {
            matches!(
                code,
                "string" | "uri" | "url" | "canonical" | "code" | "id" | "markdown" | "date"
                    | "dateTime" | "instant" | "time" | "base64Binary" | "oid" | "uuid"
            )
        }
        FhirType::Boolean => code == "boolean",
        FhirType::Integer => matches!(code, "integer" | "positiveInt" | "unsignedInt" | "decimal"),
        FhirType::Decimal => code == "decimal",
        FhirType::Coding => code == "Coding",
        FhirType::CodeableConcept => code == "CodeableConcept",
        FhirType::Quantity => {
            matches!(code, "Quantity" | "Age" | "Count" | "Distance" | "Duration" | "Money" | "SimpleQuantity")
        }
        FhirType::Reference => code == "Reference",
        FhirType::Period => code == "Period",
        FhirType::Ratio => code == "Ratio",
        FhirType::HumanName => code == "HumanName",
        FhirType::Address => code == "Address",
        FhirType::Identifier => code == "Identifier",
        FhirType::Extension => code == "Extension",
        FhirType::BackboneElement => true,
    }
}

/// The FHIR type name a discriminator's `type` check compares against.
pub(crate) fn type_name(t: FhirType) -> &'static str {
    match t {
        FhirType::String => "string",
        FhirType::Boolean => "boolean",
        FhirType::Integer => "integer",
        FhirType::Decimal => "decimal",
        FhirType::Date => "date",
        FhirType::DateTime => "dateTime",
        FhirType::Instant => "instant",
        FhirType::Time => "time",
        FhirType::Uri => "uri",
        FhirType::Coding => "Coding",
        FhirType::CodeableConcept => "CodeableConcept",
        FhirType::Quantity => "Quantity",
        FhirType::Reference => "Reference",
        FhirType::Period => "Period",
        FhirType::Ratio => "Ratio",
        FhirType::HumanName => "HumanName",
        FhirType::Address => "Address",
        FhirType::Identifier => "Identifier",
        FhirType::Extension => "Extension",
        FhirType::BackboneElement => "BackboneElement",
    }
}

fn walk_children(ctx: &mut Ctx, current_path: &str, parent: &Value) -> bool {
    for element in ctx.profile.children_of(current_path) {
        let segment = element.path.rsplit('.').next().unwrap_or(&element.path);

        let values = if let Some(prefix) = segment.strip_suffix("[x]") {
            extract_choice(ctx, element, prefix, parent)
        } else {
            extract_plain(parent, segment)
        };

        if !check_cardinality(ctx, element, values.len()) {
            return false;
        }

        for value in &values {
            if !check_value(ctx, element, value) {
                return false;
            }
        }

        if let Some(slicing) = &element.slicing {
            let mut found = Vec::new();
            slicing::validate_slicing(&element.path, slicing, &element.slices, &values, &mut found);
            for issue in found {
                if !ctx.push(issue) {
                    return false;
                }
            }
        }
    }
    true
}

fn check_value(ctx: &mut Ctx, element: &CanonicalElement, value: &Value) -> bool {
    if !element.types.is_empty() {
        let inferred = infer_type(value);
        if !type_compatible(inferred, &element.types) {
            if !ctx.push(ValidationIssue::error(
                IssueCode::TypeMismatch,
                &element.path,
                format!(
                    "value at '{}' has an incompatible shape for the declared type(s)",
                    element.path
                ),
            )) {
                return false;
            }
        }
    }

    if let Some(fixed) = &element.fixed {
        if value != fixed {
            if !ctx.push(ValidationIssue::error(
                IssueCode::FixedValueMismatch,
                &element.path,
                format!("value at '{}' does not match its fixed value", element.path),
            )) {
                return false;
            }
        }
    }

    if let Some(pattern) = &element.pattern {
        if !slicing::pattern_matches(value, pattern) {
            if !ctx.push(ValidationIssue::error(
                IssueCode::PatternValueMismatch,
                &element.path,
                format!("value at '{}' does not match its required pattern", element.path),
            )) {
                return false;
            }
        }
    }

    if !check_reference_target(ctx, element, value) {
        return false;
    }

    if value.is_object() && !walk_children(ctx, &element.path, value) {
        return false;
    }

    check_constraints(ctx, element, value, &element.path);
    true
}

fn check_reference_target(ctx: &mut Ctx, element: &CanonicalElement, value: &Value) -> bool {
    let Some(reference) = value.get("reference").and_then(Value::as_str) else {
        return true;
    };
    let target_type = reference.split('/').next().unwrap_or(reference);

    for t in &element.types {
        if t.code != "Reference" || t.target_profiles.is_empty() {
            continue;
        }
        let allowed: Vec<&str> = t
            .target_profiles
            .iter()
            .map(|p| p.rsplit('/').next().unwrap_or(p))
            .collect();
        if !allowed.contains(&target_type) {
            if !ctx.push(ValidationIssue::error(
                IssueCode::ReferenceTargetViolation,
                &element.path,
                format!(
                    "reference '{reference}' at '{}' does not target one of {allowed:?}",
                    element.path
                ),
            )) {
                return false;
            }
        }
    }
    true
}

fn check_cardinality(ctx: &mut Ctx, element: &CanonicalElement, count: usize) -> bool {
    if (count as u32) < element.min {
        if !ctx.push(ValidationIssue::error(
            IssueCode::CardinalityMinViolation,
            &element.path,
            format!(
                "'{}' requires at least {} instance(s), found {count}",
                element.path, element.min
            ),
        )) {
            return false;
        }
    }
    if !element.max.allows(count) {
        if !ctx.push(ValidationIssue::error(
            IssueCode::CardinalityMaxViolation,
            &element.path,
            format!("'{}' exceeds its maximum cardinality, found {count}", element.path),
        )) {
            return false;
        }
    }
    true
}

fn check_constraints(ctx: &mut Ctx, element: &CanonicalElement, value: &Value, path: &str) {
    for constraint in &element.constraints {
        let result = match ctx.evaluator.evaluate(&constraint.expression, value) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let satisfied = !result.iter().any(|v| v == &Value::Bool(false));
        if !satisfied {
            ctx.push(ValidationIssue::error(
                IssueCode::ConstraintViolation,
                path,
                format!("{} ({}): {}", constraint.key, path, constraint.human),
            ));
        }
    }
}

fn extract_plain(parent: &Value, segment: &str) -> Vec<Value> {
    match parent.get(segment) {
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
        None => Vec::new(),
    }
}

fn extract_choice(ctx: &mut Ctx, element: &CanonicalElement, prefix: &str, parent: &Value) -> Vec<Value> {
    let Value::Object(map) = parent else {
        return Vec::new();
    };

    let mut matches: Vec<(String, Value)> = Vec::new();
    for (key, value) in map {
        if let Some(suffix) = key.strip_prefix(prefix) {
            if !suffix.is_empty() && suffix.chars().next().is_some_and(char::is_uppercase) {
                matches.push((suffix.to_string(), value.clone()));
            }
        }
    }

    if matches.len() > 1 {
        ctx.push(ValidationIssue::error(
            IssueCode::InvalidChoiceType,
            &element.path,
            format!("more than one choice-type field present for '{}'", element.path),
        ));
        return Vec::new();
    }

    let Some((suffix, value)) = matches.into_iter().next() else {
        return Vec::new();
    };

    let declared = element.types.iter().any(|t| t.code == suffix);
    if !declared {
        ctx.push(ValidationIssue::error(
            IssueCode::InvalidChoiceType,
            &element.path,
            format!("'{prefix}{suffix}' is not one of the declared choice types for '{}'", element.path),
        ));
        return Vec::new();
    }

    vec![value]
}
