use serde_json::Value;

use crate::error::IndexError;

/// The FHIRPath evaluator is an external collaborator (§6): the core
/// consumes it through this trait and never implements expression
/// evaluation itself.
///
/// Evaluation is purely in-memory and never suspends (§5), so this trait
/// is deliberately synchronous even though the rest of the crate is async.
/// The result is a finite, forward-only sequence of raw values; callers
/// consume it once and do not restart it, matching the evaluator's
/// single-pass contract.
pub trait FhirPathEvaluator: Send + Sync {
    /// Evaluates `expression` against `root`, returning the raw matched
    /// values in document order.
    fn evaluate(&self, expression: &str, root: &Value) -> Result<Vec<Value>, IndexError>;
}

/// A minimal evaluator that understands dot-separated paths over plain
/// JSON objects/arrays, sufficient for the simple `Type.field.field`
/// expressions search parameters use. A production deployment replaces
/// this with a full FHIRPath engine; this implementation exists so the
/// indexer and its tests do not depend on one.
#[derive(Debug, Default)]
pub struct SimplePathEvaluator;

impl FhirPathEvaluator for SimplePathEvaluator {
    fn evaluate(&self, expression: &str, root: &Value) -> Result<Vec<Value>, IndexError> {
        let segments: Vec<&str> = expression.split('.').skip(1).collect();
        let mut frontier = vec![root.clone()];
        for segment in segments {
            let mut next = Vec::new();
            for value in frontier {
                collect_field(&value, segment, &mut next);
            }
            frontier = next;
        }
        Ok(frontier)
    }
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
