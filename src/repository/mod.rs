//! The versioned CRUD gateway (§4.3, §4.3a).
//!
//! The repository is the only component that talks to the relational
//! backend. Everything else (row indexing, search compilation, profile
//! validation) produces pure values that the repository binds into
//! statements; it never guesses at SQL built elsewhere.

pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::StorageResult;
use crate::project::RequestContext;

pub use postgres::PostgresRepository;

/// One versioned resource row, as read back from either the main table or
/// the history table.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResource {
    pub resource_type: String,
    pub id: Uuid,
    pub version_id: Uuid,
    pub version: i64,
    pub content: Value,
    pub last_updated: DateTime<Utc>,
    pub deleted: bool,
}

/// Paging/filtering controls for an instance- or type-level history read.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryParams {
    pub count: u32,
    pub since: Option<DateTime<Utc>>,
}

/// A parameter bound into a [`SqlFragment`] placeholder. Every value the
/// repository ever sends to the backend goes through this enum: nothing is
/// ever interpolated as literal SQL text (testable property #10).
#[derive(Debug, Clone)]
pub enum SqlParam {
    Text(String),
    TextArray(Vec<String>),
    Uuid(Uuid),
    UuidArray(Vec<Uuid>),
    TimestampTz(DateTime<Utc>),
    Numeric(Decimal),
    Boolean(bool),
    Integer(i64),
}

/// A SQL condition with its positional parameters, built by the search
/// compiler and executed, unmodified, by the repository.
#[derive(Debug, Clone, Default)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl SqlFragment {
    pub fn new(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self { sql: sql.into(), params }
    }

    /// A fragment that matches every row (used when a search has no
    /// parameters beyond paging).
    pub fn always_true() -> Self {
        Self::new("TRUE", Vec::new())
    }
}

/// A fully compiled search, ready for the repository to execute against one
/// resource type's main table.
#[derive(Debug, Clone)]
pub struct CompiledSearch {
    pub predicate: SqlFragment,
    pub order_by: Vec<String>,
    pub count: u32,
    pub offset: u32,
    pub include_total: bool,
}

/// One page of search results.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub resources: Vec<StoredResource>,
    pub total: Option<u64>,
}

/// Ambient configuration for the repository's paging defaults and
/// transaction retry policy (§9 "Configuration").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default = "default_count")]
    pub default_count: u32,
    #[serde(default = "max_count")]
    pub max_count: u32,
    #[serde(with = "humantime_serde", default = "transaction_deadline")]
    pub transaction_deadline: Duration,
    #[serde(default = "max_retries")]
    pub max_retries: u32,
    #[serde(with = "humantime_serde", default = "initial_retry_delay")]
    pub initial_retry_delay: Duration,
    #[serde(with = "humantime_serde", default = "max_retry_delay")]
    pub max_retry_delay: Duration,
    #[serde(default = "backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_count() -> u32 {
    20
}
fn max_count() -> u32 {
    1000
}
fn transaction_deadline() -> Duration {
    Duration::from_secs(30)
}
fn max_retries() -> u32 {
    3
}
fn initial_retry_delay() -> Duration {
    Duration::from_millis(100)
}
fn max_retry_delay() -> Duration {
    Duration::from_secs(5)
}
fn backoff_multiplier() -> f64 {
    2.0
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            default_count: default_count(),
            max_count: max_count(),
            transaction_deadline: transaction_deadline(),
            max_retries: max_retries(),
            initial_retry_delay: initial_retry_delay(),
            max_retry_delay: max_retry_delay(),
            backoff_multiplier: backoff_multiplier(),
        }
    }
}

/// The versioned CRUD gateway (§4.3).
///
/// Every write goes through exactly the same transaction shape: lock the
/// current row, check `ifMatch`, compute the next version, upsert the main
/// row, append a history row, and replace the reference rows. Reads never
/// need a transaction.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn create_resource(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        document: Value,
    ) -> StorageResult<StoredResource>;

    async fn read_resource(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: Uuid,
    ) -> StorageResult<StoredResource>;

    async fn read_version(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: Uuid,
        version_id: Uuid,
    ) -> StorageResult<StoredResource>;

    async fn read_history(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: Uuid,
        params: HistoryParams,
    ) -> StorageResult<Vec<StoredResource>>;

    async fn update_resource(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: Uuid,
        document: Value,
        if_match: Option<Uuid>,
    ) -> StorageResult<StoredResource>;

    async fn delete_resource(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: Uuid,
        if_match: Option<Uuid>,
    ) -> StorageResult<()>;

    async fn search_resources(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        compiled: CompiledSearch,
    ) -> StorageResult<SearchPage>;

    async fn conditional_create(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        condition: SqlFragment,
        document: Value,
    ) -> StorageResult<(StoredResource, bool)>;

    async fn conditional_update(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        condition: SqlFragment,
        document: Value,
    ) -> StorageResult<(StoredResource, bool)>;

    async fn conditional_delete(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        condition: SqlFragment,
    ) -> StorageResult<u64>;
}
