use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The FHIR type discipline of a search parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParamType {
    Token,
    String,
    Date,
    Reference,
    Quantity,
    Uri,
    Number,
}

/// The physical layout a search parameter is indexed with.
///
/// Strategy is a function of [`SearchParamType`] plus cardinality
/// expectations, decided once by the registry loader and then treated as
/// fixed input by the planner and indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexStrategy {
    /// A single typed column on the main table.
    ScalarColumn,
    /// The `__<code>` / `__<code>Text` / `__<code>Sort` triplet.
    TokenColumn,
    /// A normalized sub-table keyed by `(resourceId, index)`.
    LookupTable { table_name: String },
    /// A lookup table shared by many resource types (HumanName, Address,
    /// ContactPoint).
    SharedToken { table_name: String },
}

/// A named projection over a resource type, resolved from a FHIR
/// `SearchParameter` resource into the minimal shape the planner, indexer,
/// and search compiler need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalSearchParameter {
    /// The resource type this parameter applies to (e.g. `"Patient"`).
    pub resource_type: String,
    /// The parameter's short code (e.g. `"birthdate"`).
    pub code: String,
    /// The FHIR type discipline.
    pub param_type: SearchParamType,
    /// The FHIRPath-like expression evaluated to produce raw values.
    pub expression: String,
    /// How this parameter is physically laid out.
    pub strategy: IndexStrategy,
    /// Whether values from this parameter ever become a compartment
    /// membership (only meaningful for reference parameters named
    /// `"patient"` or `"subject"` on most resource types).
    pub compartment_defining: bool,
}

impl CanonicalSearchParameter {
    /// The column name this parameter binds to on the main table, per the
    /// planner's column synthesis rules. Token parameters bind to three
    /// columns; callers needing the full triplet should use
    /// [`Self::token_columns`] instead.
    pub fn column_name(&self) -> String {
        match &self.strategy {
            IndexStrategy::ScalarColumn => self.code.clone(),
            IndexStrategy::TokenColumn => format!("__{}", self.code),
            IndexStrategy::LookupTable { .. } | IndexStrategy::SharedToken { .. } => {
                format!("__{}", self.code)
            }
        }
    }

    /// The `(uuid_array, text_array, sort)` column names for a token-column
    /// strategy parameter.
    pub fn token_columns(&self) -> (String, String, String) {
        (
            format!("__{}", self.code),
            format!("__{}Text", self.code),
            format!("__{}Sort", self.code),
        )
    }
}

/// An immutable, keyed index of [`CanonicalSearchParameter`]s.
///
/// Keyed by `(resourceType, code)` per §4.1's stated input shape. Built
/// once at startup (or conformance reload) and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct SearchParamRegistry {
    by_resource_and_code: BTreeMap<(String, String), CanonicalSearchParameter>,
}

impl SearchParamRegistry {
    /// Builds a registry from an unordered collection of parameters.
    pub fn build(params: impl IntoIterator<Item = CanonicalSearchParameter>) -> Self {
        let mut by_resource_and_code = BTreeMap::new();
        for p in params {
            by_resource_and_code.insert((p.resource_type.clone(), p.code.clone()), p);
        }
        Self { by_resource_and_code }
    }

    /// Looks up a single parameter by resource type and code.
    pub fn get(&self, resource_type: &str, code: &str) -> Option<&CanonicalSearchParameter> {
        self.by_resource_and_code
            .get(&(resource_type.to_string(), code.to_string()))
    }

    /// Returns all parameters declared for a resource type, in
    /// deterministic (lexicographic-by-code) order.
    pub fn for_resource_type(&self, resource_type: &str) -> Vec<&CanonicalSearchParameter> {
        self.by_resource_and_code
            .iter()
            .filter(|((rt, _), _)| rt == resource_type)
            .map(|(_, p)| p)
            .collect()
    }

    /// Iterates over every resource type that has at least one declared
    /// search parameter, in deterministic order.
    pub fn resource_types(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for (rt, _) in self.by_resource_and_code.keys() {
            if seen.last().map(|s: &&str| *s) != Some(rt.as_str()) {
                seen.push(rt.as_str());
            }
        }
        seen
    }
}
