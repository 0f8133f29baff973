//! Slice assignment (§4.5a).
//!
//! A sliced element's raw instances are matched against the slicing root's
//! discriminators, in declaration order, to find which (if any) slice each
//! instance belongs to. This module only decides assignment and ordering;
//! cardinality per slice is checked by the caller once counts are known.

use serde_json::Value;

use crate::indexer::infer::infer_type;
use crate::registry::structure::{Discriminator, DiscriminatorType, SliceDefinition, Slicing, SlicingRules};

use super::issue::{IssueCode, ValidationIssue};

/// The outcome of classifying one instance against a slicing root.
pub enum SliceAssignment {
    Matched(usize),
    Unmatched,
}

/// Assigns every value in `values` to a slice (or leaves it unmatched),
/// and flags ordering/closed-slicing violations at `path`.
pub fn validate_slicing(
    path: &str,
    slicing: &Slicing,
    slices: &[SliceDefinition],
    values: &[Value],
    issues: &mut Vec<ValidationIssue>,
) {
    let mut counts = vec![0u32; slices.len()];
    let mut last_matched: Option<usize> = None;
    let mut saw_unmatched = false;

    for value in values {
        match assign(value, slicing, slices) {
            SliceAssignment::Matched(idx) => {
                counts[idx] += 1;

                if slicing.ordered {
                    if let Some(last) = last_matched {
                        if idx < last {
                            issues.push(ValidationIssue::error(
                                IssueCode::SlicingOrderViolation,
                                path,
                                format!(
                                    "slice '{}' appeared out of declaration order",
                                    slices[idx].name
                                ),
                            ));
                        }
                    }
                    last_matched = Some(idx);
                }

                if saw_unmatched && slicing.rules == SlicingRules::OpenAtEnd {
                    issues.push(ValidationIssue::error(
                        IssueCode::SlicingOrderViolation,
                        path,
                        "unmatched elements must come after all sliced elements".to_string(),
                    ));
                }
            }
            SliceAssignment::Unmatched => {
                saw_unmatched = true;
                if slicing.rules == SlicingRules::Closed {
                    issues.push(ValidationIssue::error(
                        IssueCode::SlicingNoMatch,
                        path,
                        "element matches no declared slice and slicing is closed".to_string(),
                    ));
                }
            }
        }
    }

    for (idx, slice) in slices.iter().enumerate() {
        if counts[idx] < slice.min {
            issues.push(ValidationIssue::error(
                IssueCode::CardinalityMinViolation,
                format!("{path}:{}", slice.name),
                format!(
                    "slice '{}' requires at least {} instance(s), found {}",
                    slice.name, slice.min, counts[idx]
                ),
            ));
        }
        if !slice.max.allows(counts[idx] as usize) {
            issues.push(ValidationIssue::error(
                IssueCode::CardinalityMaxViolation,
                format!("{path}:{}", slice.name),
                format!(
                    "slice '{}' exceeds its maximum cardinality, found {}",
                    slice.name, counts[idx]
                ),
            ));
        }
    }
}

fn assign(value: &Value, slicing: &Slicing, slices: &[SliceDefinition]) -> SliceAssignment {
    for (idx, slice) in slices.iter().enumerate() {
        if slicing
            .discriminators
            .iter()
            .all(|d| discriminator_matches(value, d, slice))
        {
            return SliceAssignment::Matched(idx);
        }
    }
    SliceAssignment::Unmatched
}

fn discriminator_matches(value: &Value, discriminator: &Discriminator, slice: &SliceDefinition) -> bool {
    let candidates = resolve_relative(value, &discriminator.path);

    match discriminator.kind {
        DiscriminatorType::Value => {
            let Some(expected) = slice.discriminator_values.get(&discriminator.path) else {
                return false;
            };
            candidates.iter().any(|c| c == expected)
        }
        DiscriminatorType::Pattern => {
            let Some(expected) = slice.discriminator_values.get(&discriminator.path) else {
                return false;
            };
            candidates.iter().any(|c| pattern_matches(c, expected))
        }
        DiscriminatorType::Type => candidates.iter().any(|c| {
            let name = super::type_name(infer_type(c));
            slice.discriminator_types.iter().any(|t| t == name)
        }),
        DiscriminatorType::Exists => {
            let expect_present = slice
                .discriminator_values
                .get(&discriminator.path)
                .and_then(Value::as_bool)
                .unwrap_or(true);
            !candidates.is_empty() == expect_present
        }
        DiscriminatorType::Profile => {
            let Some(Value::String(expected)) = slice.discriminator_values.get(&discriminator.path) else {
                return false;
            };
            candidates.iter().any(|c| {
                c.get("meta")
                    .and_then(|m| m.get("profile"))
                    .and_then(Value::as_array)
                    .is_some_and(|profiles| profiles.iter().any(|p| p.as_str() == Some(expected.as_str())))
            })
        }
    }
}

/// Resolves a discriminator path relative to `value`. `$this` denotes the
/// element itself; otherwise the path is a plain dot chain, traversing
/// arrays by flattening every element encountered along the way.
pub fn resolve_relative(value: &Value, path: &str) -> Vec<Value> {
    if path == "$this" {
        return vec![value.clone()];
    }

    let mut frontier = vec![value.clone()];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for item in &frontier {
            collect_field(item, segment, &mut next);
        }
        frontier = next;
    }
    frontier
}

fn collect_field(value: &Value, field: &str, out: &mut Vec<Value>) {
    match value {
        Value::Object(map) => {
            if let Some(v) = map.get(field) {
                match v {
                    Value::Array(items) => out.extend(items.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_field(item, field, out);
            }
        }
        _ => {}
    }
}

/// Structural subset match used by both the element-level pattern rule and
/// the `pattern` discriminator: every field present in `pattern` must be
/// present and equal (recursively) in `candidate`; extra fields in
/// `candidate` are ignored.
pub fn pattern_matches(candidate: &Value, pattern: &Value) -> bool {
    match (pattern, candidate) {
        (Value::Object(pmap), Value::Object(cmap)) => pmap
            .iter()
            .all(|(k, pv)| cmap.get(k).is_some_and(|cv| pattern_matches(cv, pv))),
        (Value::Array(pitems), Value::Array(citems)) => {
            pitems.len() <= citems.len()
                && pitems
                    .iter()
                    .zip(citems.iter())
                    .all(|(pv, cv)| pattern_matches(cv, pv))
        }
        _ => pattern == candidate,
    }
}
