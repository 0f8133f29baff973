use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cardinality upper bound: either a finite count or unbounded (`*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Max {
    Bounded(u32),
    Unbounded,
}

impl Max {
    /// Returns true if `count` satisfies this upper bound.
    pub fn allows(&self, count: usize) -> bool {
        match self {
            Max::Bounded(n) => count as u32 <= *n,
            Max::Unbounded => true,
        }
    }
}

/// One allowed type for an element, with optional reference target
/// profiles (only meaningful when the type is `Reference`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRef {
    /// The FHIR type name (e.g. `"string"`, `"Quantity"`, `"Reference"`).
    pub code: String,
    /// Canonical URLs this reference may target; empty for non-reference
    /// types or references with no target constraint.
    pub target_profiles: Vec<String>,
}

impl TypeRef {
    pub fn simple(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            target_profiles: Vec::new(),
        }
    }
}

/// The discriminator kind used to assign a value to a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscriminatorType {
    Value,
    Pattern,
    Type,
    Exists,
    Profile,
}

/// One discriminator: a type of check plus the path it applies to,
/// relative to the sliced element. `$this` denotes the element itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discriminator {
    pub kind: DiscriminatorType,
    pub path: String,
}

/// How unmatched and out-of-order slice values are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlicingRules {
    Closed,
    Open,
    OpenAtEnd,
}

/// A slicing root's descriptor: the ordered discriminators plus the rules
/// mode and ordering requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slicing {
    pub discriminators: Vec<Discriminator>,
    pub rules: SlicingRules,
    pub ordered: bool,
}

/// One slice definition under a slicing root: a name plus its own
/// cardinality, matched against the discriminators declared on the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceDefinition {
    pub name: String,
    pub min: u32,
    pub max: Max,
    /// Fixed/pattern values keyed by the discriminator path they satisfy,
    /// used by the `value`/`pattern` discriminator checks.
    pub discriminator_values: BTreeMap<String, Value>,
    /// Declared types at the discriminator path, used by the `type` check.
    pub discriminator_types: Vec<String>,
}

/// A single flattened, resolved schema node.
///
/// Elements with a `slice_name` are individual slices of some ancestor
/// slicing root; elements carrying `slicing` are the slicing roots
/// themselves (per §3's Canonical Profile definition).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalElement {
    /// Dot-separated path (e.g. `"Observation.component"`).
    pub path: String,
    pub min: u32,
    pub max: Max,
    pub types: Vec<TypeRef>,
    pub fixed: Option<Value>,
    pub pattern: Option<Value>,
    pub slicing: Option<Slicing>,
    pub slices: Vec<SliceDefinition>,
    pub slice_name: Option<String>,
    /// FHIRPath invariants declared on this element: `(key, expression,
    /// human message)`.
    pub constraints: Vec<Constraint>,
    pub must_support: bool,
    pub is_modifier: bool,
    pub is_summary: bool,
}

/// A FHIRPath invariant attached to an element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub key: String,
    pub expression: String,
    pub human: String,
    pub severity: ConstraintSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintSeverity {
    Error,
    Warning,
}

/// A resolved, flattened schema for one resource type: an ordered set of
/// [`CanonicalElement`]s, indexed by path for validator lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalProfile {
    pub url: String,
    pub resource_type: String,
    pub elements: Vec<CanonicalElement>,
}

impl CanonicalProfile {
    /// Looks up an element by its exact dot-separated path.
    pub fn element(&self, path: &str) -> Option<&CanonicalElement> {
        self.elements.iter().find(|e| e.path == path)
    }

    /// Returns the direct children of `path`: elements one segment deeper
    /// that are not themselves slices of a deeper ancestor.
    pub fn children_of(&self, path: &str) -> Vec<&CanonicalElement> {
        let prefix = format!("{path}.");
        self.elements
            .iter()
            .filter(|e| {
                e.path.starts_with(&prefix) && !e.path[prefix.len()..].contains('.')
            })
            .collect()
    }
}

/// An immutable index of [`CanonicalProfile`]s, keyed by canonical URL.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    by_url: BTreeMap<String, CanonicalProfile>,
}

impl ProfileRegistry {
    pub fn build(profiles: impl IntoIterator<Item = CanonicalProfile>) -> Self {
        let mut by_url = BTreeMap::new();
        for p in profiles {
            by_url.insert(p.url.clone(), p);
        }
        Self { by_url }
    }

    pub fn resolve(&self, url: &str) -> Option<&CanonicalProfile> {
        self.by_url.get(url)
    }

    /// The base profile URL convention used when a resource carries no
    /// explicit `meta.profile`: `http://hl7.org/fhir/StructureDefinition/<Type>`.
    pub fn base_url_for(resource_type: &str) -> String {
        format!("http://hl7.org/fhir/StructureDefinition/{resource_type}")
    }

    pub fn resolve_for_resource_type(&self, resource_type: &str) -> Option<&CanonicalProfile> {
        self.resolve(&Self::base_url_for(resource_type))
    }
}
