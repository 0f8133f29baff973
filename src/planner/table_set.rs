use serde::{Deserialize, Serialize};

use crate::registry::SearchParamType;

/// A column's SQL type, independent of any particular driver's type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Uuid,
    UuidArray,
    Text,
    TextArray,
    TimestampTz,
    Boolean,
    Integer,
    Numeric,
}

impl ColumnType {
    /// The Postgres type name for this column.
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Uuid => "UUID",
            ColumnType::UuidArray => "UUID[]",
            ColumnType::Text => "TEXT",
            ColumnType::TextArray => "TEXT[]",
            ColumnType::TimestampTz => "TIMESTAMPTZ",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Integer => "INTEGER",
            ColumnType::Numeric => "NUMERIC",
        }
    }

    /// The scalar column type a search parameter's [`SearchParamType`]
    /// maps to when its strategy is a plain scalar column.
    pub fn for_scalar_param(param_type: SearchParamType, is_array: bool) -> Self {
        let base = match param_type {
            SearchParamType::String | SearchParamType::Uri | SearchParamType::Reference => {
                ColumnType::Text
            }
            SearchParamType::Date => ColumnType::TimestampTz,
            SearchParamType::Quantity | SearchParamType::Number => ColumnType::Numeric,
            SearchParamType::Token => ColumnType::Text,
        };
        if is_array {
            match base {
                ColumnType::Text => ColumnType::TextArray,
                other => other,
            }
        } else {
            base
        }
    }
}

/// A single column definition, used for both main and sub-table columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub not_null: bool,
    pub default: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            not_null: false,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Renders this column as one line of a `CREATE TABLE` statement.
    pub fn render(&self) -> String {
        let mut s = format!("{} {}", quote_ident(&self.name), self.column_type.sql_name());
        if self.not_null {
            s.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            s.push_str(&format!(" DEFAULT {default}"));
        }
        s
    }
}

/// The kind of index to synthesize, per §4.1's index synthesis rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    Btree,
    PartialBtree,
    Gin,
    Trigram,
    Covering,
}

/// One index to be created on a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub kind: IndexKind,
    /// `INCLUDE (...)` columns for a covering index.
    pub include: Vec<String>,
    /// `WHERE` predicate for a partial index.
    pub predicate: Option<String>,
}

impl IndexDef {
    /// Renders this index as a `CREATE INDEX` statement.
    pub fn render(&self) -> String {
        let cols = self
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let using = match self.kind {
            IndexKind::Gin => " USING GIN",
            IndexKind::Trigram => " USING GIN",
            IndexKind::Btree | IndexKind::PartialBtree | IndexKind::Covering => "",
        };
        let cols = if self.kind == IndexKind::Trigram {
            self.columns
                .iter()
                .map(|c| format!("{} gin_trgm_ops", quote_ident(c)))
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            cols
        };
        let mut s = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {}{} ({})",
            quote_ident(&self.name),
            quote_ident(&self.table),
            using,
            cols
        );
        if !self.include.is_empty() {
            let inc = self
                .include
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            s.push_str(&format!(" INCLUDE ({inc})"));
        }
        if let Some(predicate) = &self.predicate {
            s.push_str(&format!(" WHERE {predicate}"));
        }
        s
    }
}

impl PartialEq for IndexKind {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}
impl Eq for IndexKind {}

/// One table: its columns in creation order plus a primary key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
}

impl TableDef {
    /// Renders this table as a `CREATE TABLE` statement.
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = self.columns.iter().map(ColumnDef::render).collect();
        if !self.primary_key.is_empty() {
            let pk = self
                .primary_key
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("PRIMARY KEY ({pk})"));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            quote_ident(&self.name),
            lines.join(",\n    ")
        )
    }
}

/// The complete relational layout for one resource type: main, history,
/// references, and any lookup sub-tables, plus the index list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSet {
    pub resource_type: String,
    pub main: TableDef,
    pub history: TableDef,
    pub references: TableDef,
    pub lookup_tables: Vec<TableDef>,
    pub indexes: Vec<IndexDef>,
}

impl TableSet {
    /// The conventional main table name for a resource type.
    pub fn main_table_name(resource_type: &str) -> String {
        resource_type.to_string()
    }

    pub fn history_table_name(resource_type: &str) -> String {
        format!("{resource_type}_History")
    }

    pub fn references_table_name(resource_type: &str) -> String {
        format!("{resource_type}_References")
    }

    pub fn lookup_table_name(resource_type: &str, code: &str) -> String {
        format!("{resource_type}_{code}")
    }
}

/// Quotes a SQL identifier, matching the planner's exclusive-source
/// guarantee (§4.4): every column name in emitted SQL comes from here.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
