//! Schema Planner.
//!
//! Derives a deterministic [`TableSet`] per resource type from the
//! registries: a main table, a history table, a references table, and any
//! lookup sub-tables, plus the index list the repository and search
//! compiler assume exist. Runs once at boot (or on conformance reload);
//! its output never changes at request time.

pub mod ddl;
pub mod table_set;

pub use ddl::{plan, plan_table_set, render_ddl};
pub use table_set::{ColumnDef, ColumnType, IndexDef, IndexKind, TableDef, TableSet};

use std::time::Duration;

/// Tuning knobs for the planner, following the same small-config-struct
/// convention used for [`crate::repository::RepositoryConfig`].
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Whether to emit the trigram extension's indexes. Disabling this is
    /// useful in test environments where `pg_trgm` is not installed.
    pub enable_trigram_indexes: bool,

    /// Statement timeout applied while executing the planner's DDL batch.
    pub ddl_timeout: Duration,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            enable_trigram_indexes: true,
            ddl_timeout: Duration::from_secs(30),
        }
    }
}
