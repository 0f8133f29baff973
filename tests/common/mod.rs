//! Shared fixtures for the integration test suite.
//!
//! None of these tests need a live Postgres instance: they exercise the
//! planner, indexer, search compiler, and validator directly against an
//! in-memory [`Registries`] built here, the way the indexer's and search
//! compiler's own unit tests do.

pub mod fixtures;
