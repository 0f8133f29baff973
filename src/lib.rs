//! Multi-tenant FHIR R4 storage and query core.
//!
//! This crate implements the storage-engine core of a FHIR R4 server: the
//! part that turns a schema description into relational DDL, extracts
//! indexable values from a resource document, performs versioned CRUD
//! against that schema, compiles FHIR search requests into parameterized
//! SQL, and validates resources against a profile. It does not speak HTTP,
//! handle authentication, expand terminology, evaluate FHIRPath, or seed a
//! conformance package — those are external collaborators this crate
//! either calls through a trait ([`indexer::fhirpath::FhirPathEvaluator`])
//! or leaves entirely to the binding that embeds it.
//!
//! # Architecture
//!
//! The modules build on each other in a fixed order:
//!
//! - [`registry`] — immutable canonical models (profiles, search
//!   parameters), the leaves every other component treats as read-only
//!   input.
//! - [`planner`] — turns a [`registry::structure::CanonicalProfile`] and
//!   its search parameters into a [`planner::table_set::TableSet`]: main,
//!   history, references, and lookup tables, plus indexes.
//! - [`indexer`] — evaluates search-parameter expressions against a raw
//!   document and produces the column values, lookup rows, reference
//!   rows, and compartments a planned schema expects.
//! - [`project`] — the tenant-scoping primitives ([`project::ProjectId`],
//!   [`project::RequestContext`]) every repository operation is scoped by.
//! - [`repository`] — versioned CRUD, history, transactions, and search
//!   execution against the planned schema.
//! - [`search`] — parses the search URL grammar and compiles it into the
//!   parameterized SQL the repository executes.
//! - [`validator`] — validates a document against a
//!   [`registry::structure::CanonicalProfile`].
//! - [`capabilities`] — derives a capability snapshot from the registries
//!   and repository configuration.
//! - [`error`] — the error taxonomy shared by every component above.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod capabilities;
pub mod error;
pub mod indexer;
pub mod planner;
pub mod project;
pub mod registry;
pub mod repository;
pub mod search;
pub mod validator;

pub use capabilities::{CapabilityProvider, Interaction, StorageCapabilities, SystemInteraction};
pub use error::{ErrorKind, StorageError, StorageResult};
pub use project::{ProjectId, RequestContext};
pub use registry::Registries;
pub use repository::{Repository, RepositoryConfig, StoredResource};
pub use validator::{IssueCode, ValidationIssue, ValidationSeverity};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
