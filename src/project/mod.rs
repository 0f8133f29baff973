//! Project (tenant) scoping.
//!
//! Every row in the store carries a `projectId`; every repository and
//! search operation carries a [`RequestContext`] that is injected into
//! the `WHERE` clause unless the caller is a super admin. There is no
//! tenancy-strategy abstraction here: scoping is a flat project column,
//! matching the data model in the system design (§3, §4.3).

mod context;
mod id;

pub use context::RequestContext;
pub use id::ProjectId;
