//! PostgreSQL implementation of [`Repository`].
//!
//! Every write runs inside a single `deadpool_postgres` transaction that
//! follows the same shape (§4.3 step 1-5): lock the current row, check
//! project visibility and tombstone state, check `ifMatch`, compute the next
//! version, upsert the main row plus append a history row, then replace the
//! reference rows. A serialization failure (SQLSTATE `40001`/`40P01`) retries
//! with jittered exponential backoff up to [`RepositoryConfig::max_retries`]
//! times before the transaction deadline elapses.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::{Client, Pool};
use postgres_types::ToSql;
use serde_json::Value;
use tokio_postgres::Transaction;
use uuid::Uuid;

use crate::error::{
    is_serialization_failure, ConcurrencyError, ResourceError, StorageError, StorageResult,
    TenantError, TransactionError,
};
use crate::indexer::{ColumnValue, FhirPathEvaluator, IndexedRow, RowIndexer};
use crate::planner::table_set::{quote_ident, TableSet};
use crate::project::RequestContext;
use crate::registry::Registries;

use super::{
    CompiledSearch, HistoryParams, Repository, RepositoryConfig, SearchPage, SqlFragment, SqlParam,
    StoredResource,
};

/// A connection-pooled PostgreSQL repository.
pub struct PostgresRepository {
    pool: Pool,
    registries: Registries,
    evaluator: Arc<dyn FhirPathEvaluator>,
    config: RepositoryConfig,
}

impl std::fmt::Debug for PostgresRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresRepository")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PostgresRepository {
    pub fn new(
        pool: Pool,
        registries: Registries,
        evaluator: Arc<dyn FhirPathEvaluator>,
        config: RepositoryConfig,
    ) -> Self {
        Self {
            pool,
            registries,
            evaluator,
            config,
        }
    }

    async fn client(&self) -> StorageResult<Client> {
        self.pool.get().await.map_err(StorageError::from)
    }

    fn index(&self, resource_type: &str, document: &Value) -> StorageResult<IndexedRow> {
        let indexer = RowIndexer::new(&self.registries, self.evaluator.as_ref());
        Ok(indexer.index(resource_type, document)?)
    }
}

/// The error a transaction body can fail with: either a raw driver error
/// (which `run_with_retry` inspects for SQLSTATE `40001`/`40P01` to decide
/// whether to retry) or a terminal domain error that aborts immediately.
enum TxError {
    Pg(tokio_postgres::Error),
    Domain(StorageError),
}

impl From<tokio_postgres::Error> for TxError {
    fn from(err: tokio_postgres::Error) -> Self {
        TxError::Pg(err)
    }
}

impl From<StorageError> for TxError {
    fn from(err: StorageError) -> Self {
        TxError::Domain(err)
    }
}

/// Runs `body` inside a fresh transaction, retrying on serialization
/// failures with exponential backoff until `max_retries` is exhausted or
/// the transaction deadline elapses (§4.3, §5).
async fn run_with_retry<T, F>(
    client: &mut Client,
    config: &RepositoryConfig,
    mut body: impl FnMut(&Transaction<'_>) -> F,
) -> StorageResult<T>
where
    F: std::future::Future<Output = Result<T, TxError>>,
{
    let deadline = Instant::now() + config.transaction_deadline;
    let mut delay = config.initial_retry_delay;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if Instant::now() >= deadline {
            return Err(TransactionError::Timeout {
                deadline_ms: config.transaction_deadline.as_millis() as u64,
            }
            .into());
        }

        let tx = client.transaction().await.map_err(StorageError::from)?;

        match body(&tx).await {
            Ok(value) => {
                tx.commit().await.map_err(StorageError::from)?;
                return Ok(value);
            }
            Err(TxError::Domain(err)) => {
                let _ = tx.rollback().await;
                return Err(err);
            }
            Err(TxError::Pg(err)) if is_serialization_failure(&err) => {
                let _ = tx.rollback().await;
                if attempts > config.max_retries {
                    tracing::warn!(
                        "Transaction gave up after {} attempts on serialization failure: {}",
                        attempts,
                        err
                    );
                    return Err(TransactionError::SerializationFailure { attempts }.into());
                }
                tracing::debug!(
                    "Retrying transaction after serialization failure (attempt {}): {}",
                    attempts,
                    err
                );
                tokio::time::sleep(jittered_delay(delay)).await;
                delay = std::cmp::min(
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier),
                    config.max_retry_delay,
                );
            }
            Err(TxError::Pg(err)) => {
                let _ = tx.rollback().await;
                return Err(StorageError::from(err));
            }
        }
    }
}

/// Scales `delay` by a random factor in `[0.5, 1.0]` so concurrent retries
/// on the same row don't all wake up and re-collide at once. Draws its
/// entropy from a fresh UUID rather than pulling in an RNG dependency the
/// rest of this crate has no other use for.
pub fn jittered_delay(delay: Duration) -> Duration {
    let bytes = *Uuid::new_v4().as_bytes();
    let value = u64::from_le_bytes(bytes[..8].try_into().expect("8 bytes"));
    let unit = (value as f64) / (u64::MAX as f64);
    delay.mul_f64(0.5 + unit * 0.5)
}

/// Checks that a row's `projectId` is visible to `ctx`, the same rule
/// `read_resource`/`read_version`/`read_history`/`search_resources` apply —
/// shared here so the write paths can't drift out of sync with the read
/// paths (§5's project scoping applies uniformly to every operation).
///
/// Exposed beyond this module so the crate's own integration tests can drive
/// the project-scoping decision directly, without standing up a live pool.
pub fn check_row_visible(
    ctx: &RequestContext,
    resource_type: &str,
    id: Uuid,
    row_project: Uuid,
) -> StorageResult<()> {
    if ctx.can_see(row_project.into()) {
        Ok(())
    } else {
        Err(TenantError::NotVisible {
            project: ctx.project,
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
        .into())
    }
}

/// Checks that a row locked for update is both visible to `ctx` and not a
/// tombstone. A concurrent delete racing an update must make the update
/// the loser with `ResourceGone`, not resurrect the tombstone at the next
/// version (§4.3's update/delete race rule).
///
/// Exposed beyond this module so the crate's own integration tests can drive
/// the project-scoping decision directly, without standing up a live pool.
pub fn check_row_updatable(
    ctx: &RequestContext,
    resource_type: &str,
    id: Uuid,
    row_project: Uuid,
    row_deleted: bool,
) -> StorageResult<()> {
    check_row_visible(ctx, resource_type, id, row_project)?;
    if row_deleted {
        Err(ResourceError::Gone {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
        .into())
    } else {
        Ok(())
    }
}

fn column_value_param(value: &ColumnValue) -> Option<Box<dyn ToSql + Sync>> {
    match value {
        ColumnValue::Text(s) => Some(Box::new(s.clone())),
        ColumnValue::TextArray(v) => Some(Box::new(v.clone())),
        ColumnValue::Uuid(u) => Some(Box::new(*u)),
        ColumnValue::UuidArray(v) => Some(Box::new(v.clone())),
        ColumnValue::TimestampTz(t) => Some(Box::new(*t)),
        ColumnValue::Numeric(d) => Some(Box::new(*d)),
        ColumnValue::Boolean(b) => Some(Box::new(*b)),
        ColumnValue::Null => None,
    }
}

fn sql_param_box(value: &SqlParam) -> Box<dyn ToSql + Sync> {
    match value {
        SqlParam::Text(s) => Box::new(s.clone()),
        SqlParam::TextArray(v) => Box::new(v.clone()),
        SqlParam::Uuid(u) => Box::new(*u),
        SqlParam::UuidArray(v) => Box::new(v.clone()),
        SqlParam::TimestampTz(t) => Box::new(*t),
        SqlParam::Numeric(d) => Box::new(*d),
        SqlParam::Boolean(b) => Box::new(*b),
        SqlParam::Integer(i) => Box::new(*i),
    }
}

fn stamp_meta(document: &mut Value, version_id: Uuid, last_updated: chrono::DateTime<Utc>) {
    if let Some(obj) = document.as_object_mut() {
        let meta = obj
            .entry("meta")
            .or_insert_with(|| Value::Object(Default::default()));
        if let Some(meta) = meta.as_object_mut() {
            meta.insert("versionId".into(), Value::String(version_id.to_string()));
            meta.insert(
                "lastUpdated".into(),
                Value::String(last_updated.to_rfc3339()),
            );
        }
    }
}

/// The `(columns, params)` pair for an INSERT of `indexed.main_columns`
/// plus the fixed infrastructure fields, all bound through placeholders
/// (testable property #10: no value is ever interpolated as literal SQL).
struct InsertPlan {
    columns: Vec<String>,
    params: Vec<Box<dyn ToSql + Sync>>,
}

#[allow(clippy::too_many_arguments)]
fn build_main_row_plan(
    id: Uuid,
    content: &str,
    last_updated: chrono::DateTime<Utc>,
    deleted: bool,
    project: Uuid,
    version: i64,
    version_id: Uuid,
    compartments: &[Uuid],
    indexed: &IndexedRow,
) -> InsertPlan {
    let mut columns = vec![
        "id".to_string(),
        "content".to_string(),
        "lastUpdated".to_string(),
        "deleted".to_string(),
        "projectId".to_string(),
        "__version".to_string(),
        "versionId".to_string(),
        "compartments".to_string(),
    ];
    let mut params: Vec<Box<dyn ToSql + Sync>> = vec![
        Box::new(id),
        Box::new(content.to_string()),
        Box::new(last_updated),
        Box::new(deleted),
        Box::new(project),
        Box::new(version),
        Box::new(version_id),
        Box::new(compartments.to_vec()),
    ];

    for (name, value) in &indexed.main_columns {
        if let Some(param) = column_value_param(value) {
            columns.push(name.clone());
            params.push(param);
        }
    }

    InsertPlan { columns, params }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_resource(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        mut document: Value,
    ) -> StorageResult<StoredResource> {
        let id = document
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        let indexed = self.index(resource_type, &document)?;
        let version_id = Uuid::new_v4();
        let last_updated = Utc::now();
        stamp_meta(&mut document, version_id, last_updated);
        let content = document.to_string();

        let main_table = TableSet::main_table_name(resource_type);
        let history_table = TableSet::history_table_name(resource_type);
        let references_table = TableSet::references_table_name(resource_type);
        let resource_type_owned = resource_type.to_string();
        let project = ctx.project.as_uuid();

        let mut client = self.client().await?;
        run_with_retry(&mut client, &self.config, |tx| {
            let main_table = main_table.clone();
            let history_table = history_table.clone();
            let references_table = references_table.clone();
            let content = content.clone();
            let indexed = indexed.clone();
            let resource_type_owned = resource_type_owned.clone();
            async move {
                let existing = tx
                    .query_opt(
                        &format!(
                            "SELECT 1 FROM {} WHERE id = $1 FOR UPDATE",
                            quote_ident(&main_table)
                        ),
                        &[&id],
                    )
                    .await?;
                if existing.is_some() {
                    return Err(TxError::Domain(
                        ResourceError::AlreadyExists {
                            resource_type: resource_type_owned.clone(),
                            id: id.to_string(),
                        }
                        .into(),
                    ));
                }

                let plan = build_main_row_plan(
                    id,
                    &content,
                    last_updated,
                    false,
                    project,
                    1,
                    version_id,
                    &indexed.compartments,
                    &indexed,
                );
                insert_main_row(tx, &main_table, &plan).await?;
                insert_history_row(
                    tx,
                    &history_table,
                    version_id,
                    id,
                    &content,
                    last_updated,
                    false,
                    project,
                    1,
                )
                .await?;
                replace_reference_rows(tx, &references_table, id, &indexed).await?;
                replace_lookup_rows(tx, id, &indexed).await?;
                Ok(())
            }
        })
        .await?;

        tracing::debug!("Created {}/{} at version 1", resource_type, id);

        Ok(StoredResource {
            resource_type: resource_type.to_string(),
            id,
            version_id,
            version: 1,
            content: document,
            last_updated,
            deleted: false,
        })
    }

    async fn read_resource(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: Uuid,
    ) -> StorageResult<StoredResource> {
        let client = self.client().await?;
        let main_table = TableSet::main_table_name(resource_type);
        let row = client
            .query_opt(
                &format!(
                    "SELECT content, lastUpdated, deleted, projectId, __version, versionId FROM {} WHERE id = $1",
                    quote_ident(&main_table)
                ),
                &[&id],
            )
            .await
            .map_err(StorageError::from)?;

        let row = row.ok_or_else(|| {
            StorageError::from(ResourceError::NotFound {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            })
        })?;

        let project: Uuid = row.get(3);
        if !ctx.can_see(project.into()) {
            return Err(TenantError::NotVisible {
                project: ctx.project,
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            }
            .into());
        }

        let deleted: bool = row.get(2);
        if deleted {
            return Err(ResourceError::Gone {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            }
            .into());
        }

        let content: String = row.get(0);
        let document: Value = serde_json::from_str(&content)?;

        Ok(StoredResource {
            resource_type: resource_type.to_string(),
            id,
            version_id: row.get(5),
            version: row.get::<_, i32>(4) as i64,
            content: document,
            last_updated: row.get(1),
            deleted,
        })
    }

    async fn read_version(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: Uuid,
        version_id: Uuid,
    ) -> StorageResult<StoredResource> {
        let client = self.client().await?;
        let history_table = TableSet::history_table_name(resource_type);
        let row = client
            .query_opt(
                &format!(
                    "SELECT content, lastUpdated, deleted, projectId, __version FROM {} WHERE id = $1 AND versionId = $2",
                    quote_ident(&history_table)
                ),
                &[&id, &version_id],
            )
            .await
            .map_err(StorageError::from)?;

        let row = row.ok_or_else(|| {
            StorageError::from(ResourceError::NotFound {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            })
        })?;

        let project: Uuid = row.get(3);
        if !ctx.can_see(project.into()) {
            return Err(TenantError::NotVisible {
                project: ctx.project,
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            }
            .into());
        }

        let deleted: bool = row.get(2);
        if deleted {
            return Err(ResourceError::Gone {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            }
            .into());
        }

        let content: String = row.get(0);
        let document: Value = serde_json::from_str(&content)?;

        Ok(StoredResource {
            resource_type: resource_type.to_string(),
            id,
            version_id,
            version: row.get::<_, i32>(4) as i64,
            content: document,
            last_updated: row.get(1),
            deleted,
        })
    }

    async fn read_history(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: Uuid,
        params: HistoryParams,
    ) -> StorageResult<Vec<StoredResource>> {
        let client = self.client().await?;
        let history_table = TableSet::history_table_name(resource_type);
        let count = if params.count == 0 {
            self.config.default_count
        } else {
            params.count.min(self.config.max_count)
        };

        let rows = if let Some(since) = params.since {
            client
                .query(
                    &format!(
                        "SELECT content, lastUpdated, deleted, projectId, __version, versionId FROM {} \
                         WHERE id = $1 AND lastUpdated >= $2 ORDER BY lastUpdated DESC LIMIT $3",
                        quote_ident(&history_table)
                    ),
                    &[&id, &since, &(count as i64)],
                )
                .await
        } else {
            client
                .query(
                    &format!(
                        "SELECT content, lastUpdated, deleted, projectId, __version, versionId FROM {} \
                         WHERE id = $1 ORDER BY lastUpdated DESC LIMIT $2",
                        quote_ident(&history_table)
                    ),
                    &[&id, &(count as i64)],
                )
                .await
        }
        .map_err(StorageError::from)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let project: Uuid = row.get(3);
            if !ctx.can_see(project.into()) {
                continue;
            }
            let deleted: bool = row.get(2);
            let content: String = row.get(0);
            let document: Value = if deleted {
                Value::Null
            } else {
                serde_json::from_str(&content)?
            };
            out.push(StoredResource {
                resource_type: resource_type.to_string(),
                id,
                version_id: row.get(5),
                version: row.get::<_, i32>(4) as i64,
                content: document,
                last_updated: row.get(1),
                deleted,
            });
        }
        Ok(out)
    }

    async fn update_resource(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: Uuid,
        mut document: Value,
        if_match: Option<Uuid>,
    ) -> StorageResult<StoredResource> {
        let indexed = self.index(resource_type, &document)?;
        let new_version_id = Uuid::new_v4();
        let last_updated = Utc::now();
        stamp_meta(&mut document, new_version_id, last_updated);
        let content = document.to_string();

        let main_table = TableSet::main_table_name(resource_type);
        let history_table = TableSet::history_table_name(resource_type);
        let references_table = TableSet::references_table_name(resource_type);
        let resource_type_owned = resource_type.to_string();
        let project = ctx.project.as_uuid();

        let mut client = self.client().await?;
        let next_version: i64 = run_with_retry(&mut client, &self.config, |tx| {
            let main_table = main_table.clone();
            let history_table = history_table.clone();
            let references_table = references_table.clone();
            let content = content.clone();
            let indexed = indexed.clone();
            let resource_type_owned = resource_type_owned.clone();
            async move {
                let row = tx
                    .query_opt(
                        &format!(
                            "SELECT __version, versionId, projectId, deleted FROM {} WHERE id = $1 FOR UPDATE",
                            quote_ident(&main_table)
                        ),
                        &[&id],
                    )
                    .await?;
                let row = row.ok_or_else(|| {
                    TxError::Domain(
                        ResourceError::NotFound {
                            resource_type: resource_type_owned.clone(),
                            id: id.to_string(),
                        }
                        .into(),
                    )
                })?;

                let current_version: i32 = row.get(0);
                let current_version_id: Uuid = row.get(1);
                let row_project: Uuid = row.get(2);
                let row_deleted: bool = row.get(3);
                check_row_updatable(ctx, &resource_type_owned, id, row_project, row_deleted)
                    .map_err(TxError::Domain)?;
                if let Some(expected) = if_match {
                    if expected != current_version_id {
                        return Err(TxError::Domain(
                            ConcurrencyError::VersionConflict {
                                resource_type: resource_type_owned.clone(),
                                id: id.to_string(),
                                expected: expected.to_string(),
                                actual: current_version_id.to_string(),
                            }
                            .into(),
                        ));
                    }
                }

                let next_version = current_version as i64 + 1;

                update_main_row(
                    tx,
                    &main_table,
                    id,
                    &content,
                    last_updated,
                    false,
                    next_version,
                    new_version_id,
                    &indexed,
                )
                .await?;
                insert_history_row(
                    tx,
                    &history_table,
                    new_version_id,
                    id,
                    &content,
                    last_updated,
                    false,
                    project,
                    next_version,
                )
                .await?;
                replace_reference_rows(tx, &references_table, id, &indexed).await?;
                replace_lookup_rows(tx, id, &indexed).await?;
                Ok(next_version)
            }
        })
        .await?;

        tracing::debug!("Updated {}/{} to version {}", resource_type, id, next_version);

        Ok(StoredResource {
            resource_type: resource_type.to_string(),
            id,
            version_id: new_version_id,
            version: next_version,
            content: document,
            last_updated,
            deleted: false,
        })
    }

    async fn delete_resource(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: Uuid,
        if_match: Option<Uuid>,
    ) -> StorageResult<()> {
        let new_version_id = Uuid::new_v4();
        let last_updated = Utc::now();
        let main_table = TableSet::main_table_name(resource_type);
        let history_table = TableSet::history_table_name(resource_type);
        let references_table = TableSet::references_table_name(resource_type);
        let resource_type_owned = resource_type.to_string();
        let project = ctx.project.as_uuid();

        let mut client = self.client().await?;
        run_with_retry(&mut client, &self.config, |tx| {
            let main_table = main_table.clone();
            let history_table = history_table.clone();
            let references_table = references_table.clone();
            let resource_type_owned = resource_type_owned.clone();
            async move {
                let row = tx
                    .query_opt(
                        &format!(
                            "SELECT versionId, projectId FROM {} WHERE id = $1 FOR UPDATE",
                            quote_ident(&main_table)
                        ),
                        &[&id],
                    )
                    .await?;
                let row = row.ok_or_else(|| {
                    TxError::Domain(
                        ResourceError::NotFound {
                            resource_type: resource_type_owned.clone(),
                            id: id.to_string(),
                        }
                        .into(),
                    )
                })?;

                let current_version_id: Uuid = row.get(0);
                let row_project: Uuid = row.get(1);
                check_row_visible(ctx, &resource_type_owned, id, row_project)
                    .map_err(TxError::Domain)?;
                if let Some(expected) = if_match {
                    if expected != current_version_id {
                        return Err(TxError::Domain(
                            ConcurrencyError::VersionConflict {
                                resource_type: resource_type_owned.clone(),
                                id: id.to_string(),
                                expected: expected.to_string(),
                                actual: current_version_id.to_string(),
                            }
                            .into(),
                        ));
                    }
                }

                tx.execute(
                    &format!(
                        "UPDATE {} SET content = '', deleted = true, lastUpdated = $1, __version = -1, versionId = $2 WHERE id = $3",
                        quote_ident(&main_table)
                    ),
                    &[&last_updated, &new_version_id, &id],
                )
                .await?;

                insert_history_row(
                    tx,
                    &history_table,
                    new_version_id,
                    id,
                    "",
                    last_updated,
                    true,
                    project,
                    -1,
                )
                .await?;

                tx.execute(
                    &format!(
                        "DELETE FROM {} WHERE {} = $1",
                        quote_ident(&references_table),
                        quote_ident("resourceId")
                    ),
                    &[&id],
                )
                .await?;

                Ok(())
            }
        })
        .await?;

        tracing::debug!("Deleted {}/{} (version {})", resource_type, id, new_version_id);

        Ok(())
    }

    async fn search_resources(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        compiled: CompiledSearch,
    ) -> StorageResult<SearchPage> {
        let client = self.client().await?;
        let main_table = TableSet::main_table_name(resource_type);

        let mut boxed: Vec<Box<dyn ToSql + Sync>> =
            compiled.predicate.params.iter().map(sql_param_box).collect();
        let mut sql = format!(
            "SELECT id, content, lastUpdated, deleted, projectId, __version, versionId FROM {} WHERE deleted = false AND ({})",
            quote_ident(&main_table),
            compiled.predicate.sql
        );
        if !ctx.super_admin {
            boxed.push(Box::new(ctx.project.as_uuid()));
            sql.push_str(&format!(" AND projectId = ${}", boxed.len()));
        }
        if !compiled.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&compiled.order_by.join(", "));
        }
        boxed.push(Box::new(compiled.count as i64));
        sql.push_str(&format!(" LIMIT ${}", boxed.len()));
        boxed.push(Box::new(compiled.offset as i64));
        sql.push_str(&format!(" OFFSET ${}", boxed.len()));

        let refs: Vec<&(dyn ToSql + Sync)> = boxed.iter().map(|b| b.as_ref()).collect();
        let rows = client.query(&sql, &refs).await.map_err(StorageError::from)?;
        let mut resources = Vec::with_capacity(rows.len());
        for row in rows {
            let content: String = row.get(1);
            let document: Value = serde_json::from_str(&content)?;
            resources.push(StoredResource {
                resource_type: resource_type.to_string(),
                id: row.get(0),
                version_id: row.get(6),
                version: row.get::<_, i32>(5) as i64,
                content: document,
                last_updated: row.get(2),
                deleted: row.get(3),
            });
        }

        let total = if compiled.include_total {
            let mut count_params: Vec<Box<dyn ToSql + Sync>> =
                compiled.predicate.params.iter().map(sql_param_box).collect();
            let mut count_sql = format!(
                "SELECT count(*) FROM {} WHERE deleted = false AND ({})",
                quote_ident(&main_table),
                compiled.predicate.sql
            );
            if !ctx.super_admin {
                count_params.push(Box::new(ctx.project.as_uuid()));
                count_sql.push_str(&format!(" AND projectId = ${}", count_params.len()));
            }
            let refs: Vec<&(dyn ToSql + Sync)> = count_params.iter().map(|b| b.as_ref()).collect();
            let row = client
                .query_one(&count_sql, &refs)
                .await
                .map_err(StorageError::from)?;
            let n: i64 = row.get(0);
            Some(n as u64)
        } else {
            None
        };

        tracing::debug!(
            "Search {} matched {} resource(s) (total={:?})",
            resource_type,
            resources.len(),
            total
        );

        Ok(SearchPage { resources, total })
    }

    async fn conditional_create(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        condition: SqlFragment,
        document: Value,
    ) -> StorageResult<(StoredResource, bool)> {
        let compiled = CompiledSearch {
            predicate: condition,
            order_by: Vec::new(),
            count: 2,
            offset: 0,
            include_total: false,
        };
        let page = self.search_resources(ctx, resource_type, compiled).await?;
        match page.resources.len() {
            0 => Ok((self.create_resource(ctx, resource_type, document).await?, true)),
            1 => Ok((page.resources.into_iter().next().unwrap(), false)),
            count => Err(TransactionError::PreconditionFailed {
                operation: "create".to_string(),
                count,
            }
            .into()),
        }
    }

    async fn conditional_update(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        condition: SqlFragment,
        document: Value,
    ) -> StorageResult<(StoredResource, bool)> {
        let compiled = CompiledSearch {
            predicate: condition,
            order_by: Vec::new(),
            count: 2,
            offset: 0,
            include_total: false,
        };
        let page = self.search_resources(ctx, resource_type, compiled).await?;
        match page.resources.len() {
            0 => Ok((self.create_resource(ctx, resource_type, document).await?, true)),
            1 => {
                let existing = page.resources.into_iter().next().unwrap();
                let updated = self
                    .update_resource(ctx, resource_type, existing.id, document, Some(existing.version_id))
                    .await?;
                Ok((updated, false))
            }
            count => Err(TransactionError::PreconditionFailed {
                operation: "update".to_string(),
                count,
            }
            .into()),
        }
    }

    async fn conditional_delete(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        condition: SqlFragment,
    ) -> StorageResult<u64> {
        let compiled = CompiledSearch {
            predicate: condition,
            order_by: Vec::new(),
            count: self.config.max_count,
            offset: 0,
            include_total: false,
        };
        let page = self.search_resources(ctx, resource_type, compiled).await?;
        let mut deleted = 0u64;
        for resource in page.resources {
            self.delete_resource(ctx, resource_type, resource.id, Some(resource.version_id))
                .await?;
            deleted += 1;
        }
        Ok(deleted)
    }
}

async fn insert_main_row(
    tx: &Transaction<'_>,
    table: &str,
    plan: &InsertPlan,
) -> Result<(), tokio_postgres::Error> {
    let columns: Vec<String> = plan.columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=plan.params.len()).map(|i| format!("${i}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.join(", "),
        placeholders.join(", ")
    );
    let refs: Vec<&(dyn ToSql + Sync)> = plan.params.iter().map(|b| b.as_ref()).collect();
    tx.execute(&sql, &refs).await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn update_main_row(
    tx: &Transaction<'_>,
    table: &str,
    id: Uuid,
    content: &str,
    last_updated: chrono::DateTime<Utc>,
    deleted: bool,
    version: i64,
    version_id: Uuid,
    indexed: &IndexedRow,
) -> Result<(), tokio_postgres::Error> {
    let mut assignments = vec![
        "content = $1".to_string(),
        "lastUpdated = $2".to_string(),
        "deleted = $3".to_string(),
        "__version = $4".to_string(),
        "versionId = $5".to_string(),
        "compartments = $6".to_string(),
    ];
    let mut params: Vec<Box<dyn ToSql + Sync>> = vec![
        Box::new(content.to_string()),
        Box::new(last_updated),
        Box::new(deleted),
        Box::new(version),
        Box::new(version_id),
        Box::new(indexed.compartments.clone()),
    ];

    for (name, value) in &indexed.main_columns {
        if let Some(param) = column_value_param(value) {
            params.push(param);
            assignments.push(format!("{} = ${}", quote_ident(name), params.len()));
        }
    }

    params.push(Box::new(id));
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ${}",
        quote_ident(table),
        assignments.join(", "),
        params.len()
    );
    let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|b| b.as_ref()).collect();
    tx.execute(&sql, &refs).await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn insert_history_row(
    tx: &Transaction<'_>,
    table: &str,
    version_id: Uuid,
    id: Uuid,
    content: &str,
    last_updated: chrono::DateTime<Utc>,
    deleted: bool,
    project: Uuid,
    version: i64,
) -> Result<(), tokio_postgres::Error> {
    tx.execute(
        &format!(
            "INSERT INTO {} (versionId, id, content, lastUpdated, deleted, projectId, __version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            quote_ident(table)
        ),
        &[
            &version_id,
            &id,
            &content,
            &last_updated,
            &deleted,
            &project,
            &version,
        ],
    )
    .await?;
    Ok(())
}

async fn replace_reference_rows(
    tx: &Transaction<'_>,
    table: &str,
    id: Uuid,
    indexed: &IndexedRow,
) -> Result<(), tokio_postgres::Error> {
    tx.execute(
        &format!(
            "DELETE FROM {} WHERE {} = $1",
            quote_ident(table),
            quote_ident("resourceId")
        ),
        &[&id],
    )
    .await?;
    for reference in &indexed.references {
        tx.execute(
            &format!(
                "INSERT INTO {} (\"resourceId\", \"targetId\", code) VALUES ($1, $2, $3)",
                quote_ident(table)
            ),
            &[&id, &reference.target_id, &reference.code],
        )
        .await?;
    }
    Ok(())
}

async fn replace_lookup_rows(
    tx: &Transaction<'_>,
    id: Uuid,
    indexed: &IndexedRow,
) -> Result<(), tokio_postgres::Error> {
    let mut tables: Vec<&str> = indexed.lookup_rows.iter().map(|r| r.table.as_str()).collect();
    tables.sort_unstable();
    tables.dedup();
    for table in tables {
        tx.execute(
            &format!(
                "DELETE FROM {} WHERE {} = $1",
                quote_ident(table),
                quote_ident("resourceId")
            ),
            &[&id],
        )
        .await?;
    }
    for row in &indexed.lookup_rows {
        tx.execute(
            &format!(
                "INSERT INTO {} (\"resourceId\", index, value, system) VALUES ($1, $2, $3, $4)",
                quote_ident(&row.table)
            ),
            &[&id, &row.index, &row.value, &row.system],
        )
        .await?;
    }
    Ok(())
}
