//! CRUD-shaped integration tests.
//!
//! [`fhir_store_core::repository::Repository`] has exactly one
//! implementation, [`fhir_store_core::repository::PostgresRepository`],
//! which opens a real connection pool on construction — so these tests
//! exercise the parts of the create/read/update/delete path that run
//! without a backend: row indexing, schema planning, and the
//! configuration/config-driven paging defaults a repository is built
//! with. A live-Postgres CRUD suite is a separate, environment-gated
//! concern this crate does not carry (§6: the relational backend is an
//! external collaborator).

pub mod create_tests;
pub mod delete_tests;
pub mod read_tests;
pub mod update_tests;
