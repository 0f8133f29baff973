//! Error types for the storage core.
//!
//! Errors are organized by concern (planner, indexer, repository, search,
//! transaction, validation, backend) and rolled up into [`StorageError`].
//! Every variant maps onto exactly one of the fixed error kinds in
//! [`ErrorKind`]; callers that need the kind for a protocol binding (e.g.
//! an HTTP status) should match on [`StorageError::kind`] rather than on
//! the concrete variant.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::project::ProjectId;

/// The fixed, machine-readable error taxonomy.
///
/// This is the sum type referenced throughout the core; every fallible
/// operation either returns a value or one of these kinds (wrapped in a
/// [`StorageError`]). Mapping a kind to an HTTP status or `OperationOutcome`
/// is an interface concern, not something this crate decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidSpec,
    InvalidResource,
    ResourceNotFound,
    ResourceGone,
    VersionConflict,
    PreconditionFailed,
    InvalidSearchRequest,
    Timeout,
    InternalError,
}

/// The primary error type for all core operations.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),

    #[error(transparent)]
    Tenant(#[from] TenantError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StorageError {
    /// Classifies this error into one of the fixed taxonomy kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Planner(_) => ErrorKind::InvalidSpec,
            StorageError::Index(_) => ErrorKind::InvalidResource,
            StorageError::Resource(ResourceError::NotFound { .. }) => ErrorKind::ResourceNotFound,
            StorageError::Resource(ResourceError::Gone { .. }) => ErrorKind::ResourceGone,
            StorageError::Resource(ResourceError::AlreadyExists { .. }) => {
                ErrorKind::InvalidResource
            }
            StorageError::Concurrency(ConcurrencyError::VersionConflict { .. }) => {
                ErrorKind::VersionConflict
            }
            StorageError::Concurrency(ConcurrencyError::DuplicateVersion { .. }) => {
                ErrorKind::InternalError
            }
            StorageError::Tenant(_) => ErrorKind::ResourceNotFound,
            StorageError::Validation(_) => ErrorKind::InvalidResource,
            StorageError::Search(_) => ErrorKind::InvalidSearchRequest,
            StorageError::Transaction(TransactionError::Timeout { .. }) => ErrorKind::Timeout,
            StorageError::Transaction(TransactionError::PreconditionFailed { .. }) => {
                ErrorKind::PreconditionFailed
            }
            StorageError::Transaction(_) => ErrorKind::InternalError,
            StorageError::Backend(_) => ErrorKind::InternalError,
        }
    }
}

/// Errors raised while planning the relational schema for a resource type.
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("search parameter '{resource_type}.{code}' conflicts with fixed column '{column}'")]
    ColumnConflict {
        resource_type: String,
        code: String,
        column: String,
    },

    #[error("profile not resolvable: {url}")]
    ProfileNotResolvable { url: String },

    #[error("invalid schema specification: {message}")]
    InvalidSpec { message: String },
}

/// Errors raised while extracting indexable column values from a document.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("failed to evaluate expression '{expression}' for search parameter '{code}': {message}")]
    EvaluationFailed {
        code: String,
        expression: String,
        message: String,
    },

    #[error("could not infer a FHIR type for value at '{path}'")]
    TypeInferenceFailed { path: String },

    #[error("malformed reference value: {reference}")]
    MalformedReference { reference: String },
}

/// Errors related to resource existence.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("resource not found: {resource_type}/{id}")]
    NotFound { resource_type: String, id: String },

    #[error("resource already exists: {resource_type}/{id}")]
    AlreadyExists { resource_type: String, id: String },

    #[error("resource deleted: {resource_type}/{id}")]
    Gone { resource_type: String, id: String },
}

/// Errors related to optimistic concurrency control.
#[derive(Error, Debug)]
pub enum ConcurrencyError {
    #[error("version conflict on {resource_type}/{id}: expected {expected}, found {actual}")]
    VersionConflict {
        resource_type: String,
        id: String,
        expected: String,
        actual: String,
    },

    #[error("history row already exists for versionId {version_id}")]
    DuplicateVersion { version_id: String },
}

/// Errors related to project (tenant) scoping.
#[derive(Error, Debug)]
pub enum TenantError {
    #[error("resource {resource_type}/{id} not visible to project {project}")]
    NotVisible {
        project: ProjectId,
        resource_type: String,
        id: String,
    },
}

/// Errors produced by profile validation.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("resource failed validation with {} issue(s)", .issues.len())]
    InvalidResource {
        issues: Vec<crate::validator::ValidationIssue>,
    },
}

/// Errors raised while parsing or compiling a search request.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("malformed search request: {message}")]
    MalformedRequest { message: String },

    #[error("unknown prefix '{prefix}' on parameter '{code}'")]
    UnknownPrefix { code: String, prefix: String },

    #[error("unknown modifier '{modifier}' on parameter '{code}'")]
    UnknownModifier { code: String, modifier: String },

    #[error("chained search exceeds the supported depth of 1: '{chain}'")]
    ChainTooDeep { chain: String },

    #[error("unknown search parameter: {code}")]
    UnknownParameter { code: String },
}

/// Errors related to repository transactions.
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("transaction exceeded its deadline of {deadline_ms}ms")]
    Timeout { deadline_ms: u64 },

    #[error("serialization failure after {attempts} attempt(s)")]
    SerializationFailure { attempts: u32 },

    #[error("conditional {operation} matched {count} resources, expected exactly 1")]
    PreconditionFailed { operation: String, count: usize },

    #[error("transaction rolled back: {reason}")]
    RolledBack { reason: String },
}

/// Errors originating from the storage engine itself.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("connection pool error: {message}")]
    Pool { message: String },

    #[error("query execution failed: {message}")]
    Query { message: String },

    #[error("serialization error: {message}")]
    Serialization { message: String },

    #[error("internal backend error: {message}")]
    Internal { message: String },
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::Serialization {
            message: err.to_string(),
        })
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<tokio_postgres::Error> for StorageError {
    fn from(err: tokio_postgres::Error) -> Self {
        StorageError::Backend(classify_postgres_error(err))
    }
}

impl From<tokio_postgres::Error> for BackendError {
    fn from(err: tokio_postgres::Error) -> Self {
        classify_postgres_error(err)
    }
}

impl From<deadpool_postgres::PoolError> for StorageError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        StorageError::Backend(BackendError::Pool {
            message: err.to_string(),
        })
    }
}

fn classify_postgres_error(err: tokio_postgres::Error) -> BackendError {
    BackendError::Query {
        message: err.to_string(),
    }
}

/// Returns true if a postgres error is a serialization failure (SQLSTATE
/// `40001`) that the repository's retry loop should retry.
pub fn is_serialization_failure(err: &tokio_postgres::Error) -> bool {
    err.code()
        .is_some_and(|c| c.code() == "40001" || c.code() == "40P01")
}

/// Result type alias for core operations.
pub type StorageResult<T> = Result<T, StorageError>;
