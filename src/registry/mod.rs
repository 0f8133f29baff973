//! Canonical models and immutable registries.
//!
//! The registries are the leaves of the build order (§2): they hold the
//! resolved, flattened view of StructureDefinitions and SearchParameters
//! that every other component treats as read-only input. Once built,
//! a `Registries` value is never mutated again; it is shared by value
//! (cheaply, via `Arc`) between the planner, indexer, search compiler,
//! and validator.

pub mod search_param;
pub mod structure;

pub use search_param::{CanonicalSearchParameter, IndexStrategy, SearchParamRegistry, SearchParamType};
pub use structure::{
    CanonicalElement, CanonicalProfile, Constraint, ConstraintSeverity, Discriminator,
    DiscriminatorType, Max, ProfileRegistry, SliceDefinition, Slicing, SlicingRules, TypeRef,
};

use std::sync::Arc;

/// The immutable bundle of registries the rest of the core depends on.
///
/// Cloning a `Registries` is cheap: it is a handle around an `Arc`, so
/// sharing it between the planner, repository, and search compiler never
/// copies the underlying maps.
#[derive(Debug, Clone)]
pub struct Registries {
    inner: Arc<RegistriesInner>,
}

#[derive(Debug)]
struct RegistriesInner {
    profiles: ProfileRegistry,
    search_params: SearchParamRegistry,
}

impl Registries {
    /// Builds a fresh, immutable registry bundle.
    pub fn build(
        profiles: ProfileRegistry,
        search_params: SearchParamRegistry,
    ) -> Self {
        Self {
            inner: Arc::new(RegistriesInner {
                profiles,
                search_params,
            }),
        }
    }

    pub fn profiles(&self) -> &ProfileRegistry {
        &self.inner.profiles
    }

    pub fn search_params(&self) -> &SearchParamRegistry {
        &self.inner.search_params
    }
}
