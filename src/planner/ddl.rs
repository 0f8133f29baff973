use std::collections::BTreeSet;

use crate::error::PlannerError;
use crate::registry::{CanonicalSearchParameter, IndexStrategy, Registries};

use super::table_set::{ColumnDef, ColumnType, IndexDef, IndexKind, TableDef, TableSet};

/// Well-known composite-type codes that are routed to a single
/// cross-resource-type lookup table rather than a per-resource-type one
/// (§3's "global lookup tables" for HumanName/Address/ContactPoint).
const GLOBAL_LOOKUP_CODES: &[(&str, &str)] = &[
    ("name", "GlobalHumanName"),
    ("address", "GlobalAddress"),
    ("telecom", "GlobalContactPoint"),
];

fn global_lookup_table(code: &str) -> Option<&'static str> {
    GLOBAL_LOOKUP_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, table)| *table)
}

/// Returns the fixed infrastructure columns present on every main table,
/// in the order the planner always emits them. `compartments` is omitted
/// for Binary per §4.1.
fn fixed_columns(resource_type: &str) -> Vec<ColumnDef> {
    let mut cols = vec![
        ColumnDef::new("id", ColumnType::Uuid).not_null(),
        ColumnDef::new("content", ColumnType::Text).not_null(),
        ColumnDef::new("lastUpdated", ColumnType::TimestampTz).not_null(),
        ColumnDef::new("deleted", ColumnType::Boolean)
            .not_null()
            .with_default("false"),
        ColumnDef::new("projectId", ColumnType::Uuid).not_null(),
        ColumnDef::new("__version", ColumnType::Integer).not_null(),
        ColumnDef::new("versionId", ColumnType::Uuid).not_null(),
    ];
    if resource_type != "Binary" {
        cols.push(
            ColumnDef::new("compartments", ColumnType::UuidArray)
                .not_null()
                .with_default("'{}'"),
        );
    }
    cols.extend([
        ColumnDef::new("__sharedTokens", ColumnType::UuidArray),
        ColumnDef::new("__sharedTokensText", ColumnType::TextArray),
        ColumnDef::new("__tag", ColumnType::UuidArray),
        ColumnDef::new("__tagText", ColumnType::TextArray),
        ColumnDef::new("__security", ColumnType::UuidArray),
        ColumnDef::new("__securityText", ColumnType::TextArray),
        ColumnDef::new("_profile", ColumnType::TextArray),
        ColumnDef::new("_source", ColumnType::Text),
    ]);
    cols
}

fn fixed_column_names(resource_type: &str) -> BTreeSet<String> {
    fixed_columns(resource_type)
        .into_iter()
        .map(|c| c.name)
        .collect()
}

/// Plans the complete [`TableSet`] for one resource type.
///
/// Fails with [`PlannerError::ColumnConflict`] if a declared search
/// parameter's column name collides with a fixed infrastructure column.
pub fn plan_table_set(
    resource_type: &str,
    params: &[&CanonicalSearchParameter],
) -> Result<TableSet, PlannerError> {
    let fixed = fixed_column_names(resource_type);
    let mut main_columns = fixed_columns(resource_type);
    let mut lookup_tables = Vec::new();
    let mut index_columns_btree = Vec::new();
    let mut index_columns_gin = Vec::new();
    let mut index_columns_trigram = Vec::new();

    for param in params {
        match &param.strategy {
            IndexStrategy::ScalarColumn => {
                let name = param.column_name();
                if fixed.contains(&name) {
                    return Err(PlannerError::ColumnConflict {
                        resource_type: resource_type.to_string(),
                        code: param.code.clone(),
                        column: name,
                    });
                }
                let is_array = matches!(
                    param.param_type,
                    crate::registry::SearchParamType::Reference | crate::registry::SearchParamType::Uri
                ) && param.code == "_profile";
                let column_type = ColumnType::for_scalar_param(param.param_type, is_array);
                main_columns.push(ColumnDef::new(name.clone(), column_type));
                index_columns_btree.push(name);
            }
            IndexStrategy::TokenColumn => {
                let (uuid_col, text_col, sort_col) = param.token_columns();
                for col in [&uuid_col, &text_col, &sort_col] {
                    if fixed.contains(col) {
                        return Err(PlannerError::ColumnConflict {
                            resource_type: resource_type.to_string(),
                            code: param.code.clone(),
                            column: col.clone(),
                        });
                    }
                }
                main_columns.push(ColumnDef::new(uuid_col.clone(), ColumnType::UuidArray));
                main_columns.push(ColumnDef::new(text_col.clone(), ColumnType::TextArray));
                main_columns.push(ColumnDef::new(sort_col.clone(), ColumnType::Text));
                index_columns_gin.push(uuid_col);
                index_columns_trigram.push(text_col);
            }
            IndexStrategy::LookupTable { table_name } => {
                lookup_tables.push(lookup_sub_table(table_name));
            }
            IndexStrategy::SharedToken { table_name } => {
                let target = global_lookup_table(&param.code).unwrap_or(table_name.as_str());
                if !lookup_tables.iter().any(|t: &TableDef| t.name == target) {
                    lookup_tables.push(lookup_sub_table(target));
                }
            }
        }
    }

    lookup_tables.sort_by(|a, b| a.name.cmp(&b.name));

    let main = TableDef {
        name: TableSet::main_table_name(resource_type),
        columns: main_columns,
        primary_key: vec!["id".into()],
    };

    let history = history_table(resource_type);
    let references = references_table(resource_type);

    let mut indexes = synthesize_indexes(
        resource_type,
        &index_columns_btree,
        &index_columns_gin,
        &index_columns_trigram,
    );
    indexes.push(references_covering_index(resource_type));
    indexes.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(TableSet {
        resource_type: resource_type.to_string(),
        main,
        history,
        references,
        lookup_tables,
        indexes,
    })
}

fn lookup_sub_table(table_name: &str) -> TableDef {
    TableDef {
        name: table_name.to_string(),
        columns: vec![
            ColumnDef::new("resourceId", ColumnType::Uuid).not_null(),
            ColumnDef::new("index", ColumnType::Integer).not_null(),
            ColumnDef::new("value", ColumnType::Text),
            ColumnDef::new("system", ColumnType::Text),
        ],
        primary_key: vec!["resourceId".into(), "index".into()],
    }
}

fn history_table(resource_type: &str) -> TableDef {
    TableDef {
        name: TableSet::history_table_name(resource_type),
        columns: vec![
            ColumnDef::new("versionId", ColumnType::Uuid).not_null(),
            ColumnDef::new("id", ColumnType::Uuid).not_null(),
            ColumnDef::new("content", ColumnType::Text).not_null(),
            ColumnDef::new("lastUpdated", ColumnType::TimestampTz).not_null(),
            ColumnDef::new("deleted", ColumnType::Boolean).not_null(),
            ColumnDef::new("projectId", ColumnType::Uuid).not_null(),
            ColumnDef::new("__version", ColumnType::Integer).not_null(),
        ],
        primary_key: vec!["versionId".into()],
    }
}

fn references_table(resource_type: &str) -> TableDef {
    TableDef {
        name: TableSet::references_table_name(resource_type),
        columns: vec![
            ColumnDef::new("resourceId", ColumnType::Uuid).not_null(),
            ColumnDef::new("targetId", ColumnType::Uuid).not_null(),
            ColumnDef::new("code", ColumnType::Text).not_null(),
        ],
        primary_key: vec!["resourceId".into(), "targetId".into(), "code".into()],
    }
}

fn references_covering_index(resource_type: &str) -> IndexDef {
    IndexDef {
        name: format!("idx_{resource_type}_refs_target"),
        table: TableSet::references_table_name(resource_type),
        columns: vec!["targetId".into(), "code".into()],
        kind: IndexKind::Covering,
        include: vec!["resourceId".into()],
        predicate: None,
    }
}

fn synthesize_indexes(
    resource_type: &str,
    btree_cols: &[String],
    gin_cols: &[String],
    trigram_cols: &[String],
) -> Vec<IndexDef> {
    let main = TableSet::main_table_name(resource_type);
    let mut indexes = vec![
        IndexDef {
            name: format!("idx_{resource_type}_lastUpdated"),
            table: main.clone(),
            columns: vec!["lastUpdated".into()],
            kind: IndexKind::Btree,
            include: vec![],
            predicate: None,
        },
        IndexDef {
            name: format!("idx_{resource_type}_project_lastUpdated"),
            table: main.clone(),
            columns: vec!["projectId".into(), "lastUpdated".into()],
            kind: IndexKind::Btree,
            include: vec![],
            predicate: None,
        },
        IndexDef {
            name: format!("idx_{resource_type}_compartments"),
            table: main.clone(),
            columns: vec!["compartments".into()],
            kind: IndexKind::Gin,
            include: vec![],
            predicate: None,
        },
        IndexDef {
            name: format!("idx_{resource_type}_sharedTokens"),
            table: main.clone(),
            columns: vec!["__sharedTokens".into()],
            kind: IndexKind::Gin,
            include: vec![],
            predicate: None,
        },
        IndexDef {
            name: format!("idx_{resource_type}_profile"),
            table: main.clone(),
            columns: vec!["_profile".into()],
            kind: IndexKind::Gin,
            include: vec![],
            predicate: None,
        },
        IndexDef {
            name: format!("idx_{resource_type}_securityText_trgm"),
            table: main.clone(),
            columns: vec!["__securityText".into()],
            kind: IndexKind::Trigram,
            include: vec![],
            predicate: None,
        },
        IndexDef {
            name: format!("idx_{resource_type}_tagText_trgm"),
            table: main.clone(),
            columns: vec!["__tagText".into()],
            kind: IndexKind::Trigram,
            include: vec![],
            predicate: None,
        },
        IndexDef {
            name: format!("idx_{resource_type}_current_version"),
            table: main.clone(),
            columns: vec!["lastUpdated".into(), "__version".into()],
            kind: IndexKind::PartialBtree,
            include: vec![],
            predicate: Some("deleted = false".into()),
        },
    ];

    for col in btree_cols {
        indexes.push(IndexDef {
            name: format!("idx_{resource_type}_{col}"),
            table: main.clone(),
            columns: vec![col.clone()],
            kind: IndexKind::Btree,
            include: vec![],
            predicate: None,
        });
    }
    for col in gin_cols {
        indexes.push(IndexDef {
            name: format!("idx_{resource_type}_{col}_gin"),
            table: main.clone(),
            columns: vec![col.clone()],
            kind: IndexKind::Gin,
            include: vec![],
            predicate: None,
        });
    }
    for col in trigram_cols {
        indexes.push(IndexDef {
            name: format!("idx_{resource_type}_{col}_trgm"),
            table: main.clone(),
            columns: vec![col.clone()],
            kind: IndexKind::Trigram,
            include: vec![],
            predicate: None,
        });
    }

    indexes
}

/// Plans table sets for every resource type declared in the search
/// parameter registry, in deterministic (lexicographic) resource-type
/// order, and renders the full DDL script.
///
/// Two calls with the same registries are guaranteed to emit the same
/// table sets and byte-identical DDL (§4.1, testable property #9): all
/// intermediate ordering is driven by `BTreeMap`/sorted collections, never
/// by iteration order over a hash map.
pub fn plan(registries: &Registries) -> Result<Vec<TableSet>, PlannerError> {
    let mut resource_types: Vec<&str> = registries.search_params().resource_types();
    resource_types.sort_unstable();

    let mut table_sets = Vec::with_capacity(resource_types.len());
    for rt in resource_types {
        let params = registries.search_params().for_resource_type(rt);
        table_sets.push(plan_table_set(rt, &params)?);
    }
    tracing::debug!("Planned {} table set(s)", table_sets.len());
    Ok(table_sets)
}

/// Renders the full ordered DDL script for a planned set of table sets:
/// tables before indexes; within tables, main before history before
/// references before lookups (§4.1's determinism/ordering rule).
pub fn render_ddl(table_sets: &[TableSet]) -> Vec<String> {
    let mut statements = Vec::new();
    for ts in table_sets {
        statements.push(ts.main.render());
    }
    for ts in table_sets {
        statements.push(ts.history.render());
    }
    for ts in table_sets {
        statements.push(ts.references.render());
    }
    for ts in table_sets {
        for lookup in &ts.lookup_tables {
            statements.push(lookup.render());
        }
    }
    for ts in table_sets {
        for index in &ts.indexes {
            statements.push(index.render());
        }
    }
    statements
}
