//! Row Indexer.
//!
//! Given a resource document and the search parameters declared for its
//! type, computes the map of column values that the repository writes
//! into the main table, the sub-rows for token/lookup columns, the list
//! of outbound references, and the compartment memberships derived from
//! Patient references anywhere in the document (§4.2, §4.3 "Compartments").

pub mod convert;
pub mod fhirpath;
pub mod infer;

pub use fhirpath::{FhirPathEvaluator, SimplePathEvaluator};
pub use infer::{infer_type, FhirType};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use crate::error::IndexError;
use crate::registry::{CanonicalSearchParameter, IndexStrategy, Registries, SearchParamType};

use convert::{canonicalize_reference, normalize_string, parse_date_interval, parse_decimal, token_value};

/// One column's value, in the shape the repository binds straight into a
/// parameterized statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(String),
    TextArray(Vec<String>),
    Uuid(Uuid),
    UuidArray(Vec<Uuid>),
    TimestampTz(DateTime<Utc>),
    Numeric(Decimal),
    Boolean(bool),
    Null,
}

/// One row destined for a lookup sub-table.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRow {
    pub table: String,
    pub index: i32,
    pub value: Option<String>,
    pub system: Option<String>,
}

/// One outbound reference projection, destined for the references table.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRow {
    pub target_id: Uuid,
    pub code: String,
}

/// The complete output of indexing one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedRow {
    pub main_columns: BTreeMap<String, ColumnValue>,
    pub lookup_rows: Vec<LookupRow>,
    pub references: Vec<ReferenceRow>,
    pub compartments: Vec<Uuid>,
}

/// Extracts search-column values from a resource document, per the
/// registry's declared search parameters for that resource type.
pub struct RowIndexer<'a> {
    registries: &'a Registries,
    evaluator: &'a dyn FhirPathEvaluator,
}

impl<'a> RowIndexer<'a> {
    pub fn new(registries: &'a Registries, evaluator: &'a dyn FhirPathEvaluator) -> Self {
        Self { registries, evaluator }
    }

    /// Indexes `document` for `resource_type`. Indexing is a pure function
    /// of the document and the registry: the same inputs always produce
    /// the same [`IndexedRow`] (§4.2's idempotence requirement).
    pub fn index(&self, resource_type: &str, document: &Value) -> Result<IndexedRow, IndexError> {
        let mut row = IndexedRow::default();
        let params = self.registries.search_params().for_resource_type(resource_type);

        for param in params {
            let raw = self
                .evaluator
                .evaluate(&param.expression, document)
                .map_err(|e| match e {
                    IndexError::EvaluationFailed { .. } => e,
                    other => IndexError::EvaluationFailed {
                        code: param.code.clone(),
                        expression: param.expression.clone(),
                        message: other.to_string(),
                    },
                })?;

            if param.param_type == SearchParamType::Reference {
                for v in &raw {
                    if let Some(reference_row) = reference_row_for(v, &param.code) {
                        row.references.push(reference_row);
                    }
                }
            }

            bind_by_strategy(param, &raw, &mut row)?;
        }

        row.compartments = scan_compartments(document);
        Ok(row)
    }
}

fn bind_by_strategy(
    param: &CanonicalSearchParameter,
    raw: &[Value],
    row: &mut IndexedRow,
) -> Result<(), IndexError> {
    match &param.strategy {
        IndexStrategy::ScalarColumn => {
            if let Some(first) = raw.first() {
                let value = scalar_column_value(param.param_type, first)?;
                row.main_columns.insert(param.column_name(), value);
            }
        }
        IndexStrategy::TokenColumn => {
            let (uuid_col, text_col, sort_col) = param.token_columns();
            let mut uuids = Vec::new();
            let mut texts = Vec::new();
            let mut sort = None;
            for v in raw {
                let (system, code) = token_system_code(v);
                let token = token_value(system.as_deref(), code.as_deref());
                if sort.is_none() {
                    sort = code.clone().or_else(|| Some(token.text.clone()));
                }
                uuids.push(token.hash);
                texts.push(token.text);
            }
            if !uuids.is_empty() {
                row.main_columns.insert(uuid_col, ColumnValue::UuidArray(uuids));
                row.main_columns.insert(text_col, ColumnValue::TextArray(texts));
                if let Some(s) = sort {
                    row.main_columns.insert(sort_col, ColumnValue::Text(s));
                }
            }
        }
        IndexStrategy::LookupTable { table_name } | IndexStrategy::SharedToken { table_name } => {
            for (i, v) in raw.iter().enumerate() {
                let (value, system) = lookup_value_system(v);
                row.lookup_rows.push(LookupRow {
                    table: table_name.clone(),
                    index: i as i32,
                    value,
                    system,
                });
            }
        }
    }
    Ok(())
}

fn scalar_column_value(param_type: SearchParamType, raw: &Value) -> Result<ColumnValue, IndexError> {
    match param_type {
        SearchParamType::String => {
            let s = raw.as_str().unwrap_or_default();
            Ok(ColumnValue::Text(normalize_string(s).original))
        }
        SearchParamType::Uri => Ok(ColumnValue::Text(raw.as_str().unwrap_or_default().to_string())),
        SearchParamType::Reference => {
            let r = raw
                .get("reference")
                .and_then(Value::as_str)
                .or_else(|| raw.as_str())
                .unwrap_or_default();
            Ok(ColumnValue::Text(canonicalize_reference(r)))
        }
        SearchParamType::Date => {
            let s = raw.as_str().unwrap_or_default();
            let interval = parse_date_interval(s)?;
            Ok(ColumnValue::TimestampTz(interval.lo))
        }
        SearchParamType::Number => Ok(ColumnValue::Numeric(parse_decimal(raw)?)),
        SearchParamType::Quantity => {
            let value = raw.get("value").unwrap_or(raw);
            Ok(ColumnValue::Numeric(parse_decimal(value)?))
        }
        SearchParamType::Token => {
            let s = raw.as_str().unwrap_or_default();
            Ok(ColumnValue::Text(s.to_string()))
        }
    }
}

fn token_system_code(raw: &Value) -> (Option<String>, Option<String>) {
    match raw {
        Value::Object(map) => (
            map.get("system").and_then(Value::as_str).map(str::to_string),
            map.get("code").and_then(Value::as_str).map(str::to_string),
        ),
        Value::String(s) => (None, Some(s.clone())),
        Value::Bool(b) => (None, Some(b.to_string())),
        _ => (None, None),
    }
}

fn lookup_value_system(raw: &Value) -> (Option<String>, Option<String>) {
    match raw {
        Value::Object(map) => {
            let value = map
                .get("family")
                .or_else(|| map.get("text"))
                .or_else(|| map.get("value"))
                .or_else(|| map.get("city"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let system = map.get("system").and_then(Value::as_str).map(str::to_string);
            (value, system)
        }
        Value::String(s) => (Some(s.clone()), None),
        _ => (None, None),
    }
}

fn reference_row_for(raw: &Value, code: &str) -> Option<ReferenceRow> {
    let reference = raw.get("reference").and_then(Value::as_str).or_else(|| raw.as_str())?;
    let target_id = convert::reference_target_type(reference)
        .and(reference.rsplit('/').next())
        .and_then(|id| Uuid::parse_str(id).ok())?;
    Some(ReferenceRow {
        target_id,
        code: code.to_string(),
    })
}

/// Scans the document for any reference into `Patient`, yielding the set
/// of distinct compartment UUIDs. This is independent of any single
/// declared search parameter: it walks the whole document, matching
/// §4.3's "the set of Patient references found anywhere in the document".
fn scan_compartments(document: &Value) -> Vec<Uuid> {
    let mut found = Vec::new();
    walk_for_patient_refs(document, &mut found);
    found.sort_unstable();
    found.dedup();
    found
}

fn walk_for_patient_refs(value: &Value, out: &mut Vec<Uuid>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("reference") {
                if convert::reference_target_type(reference) == Some("Patient") {
                    if let Some(id) = reference.rsplit('/').next() {
                        if let Ok(uuid) = Uuid::parse_str(id) {
                            out.push(uuid);
                        }
                    }
                }
            }
            for v in map.values() {
                walk_for_patient_refs(v, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_for_patient_refs(item, out);
            }
        }
        _ => {}
    }
}
