//! Capability discovery.
//!
//! Not part of the distilled core, but cheap to expose: the schema planner
//! and search-parameter registry already know which resource types exist,
//! which interactions the repository supports, and which search
//! parameters and modifiers are live. This module derives a capability
//! snapshot from that state rather than hand-maintaining a parallel
//! description of it.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::{Registries, SearchParamType};
use crate::repository::RepositoryConfig;

/// Supported FHIR interactions for a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Interaction {
    Read,
    Vread,
    Update,
    Delete,
    HistoryInstance,
    HistoryType,
    Create,
    SearchType,
}

impl std::fmt::Display for Interaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Interaction::Read => "read",
            Interaction::Vread => "vread",
            Interaction::Update => "update",
            Interaction::Delete => "delete",
            Interaction::HistoryInstance => "history-instance",
            Interaction::HistoryType => "history-type",
            Interaction::Create => "create",
            Interaction::SearchType => "search-type",
        };
        f.write_str(s)
    }
}

/// Supported system-level interactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SystemInteraction {
    Transaction,
    Batch,
    HistorySystem,
    SearchSystem,
}

impl std::fmt::Display for SystemInteraction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SystemInteraction::Transaction => "transaction",
            SystemInteraction::Batch => "batch",
            SystemInteraction::HistorySystem => "history-system",
            SystemInteraction::SearchSystem => "search-system",
        };
        f.write_str(s)
    }
}

/// One search parameter's discoverable shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParamCapability {
    pub name: String,
    pub param_type: SearchParamType,
    pub modifiers: Vec<String>,
    pub supports_chaining: bool,
}

/// Capabilities for a single resource type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceCapabilities {
    pub resource_type: String,
    pub interactions: HashSet<Interaction>,
    pub search_params: Vec<SearchParamCapability>,
    pub conditional_create: bool,
    pub conditional_update: bool,
    pub conditional_delete: bool,
}

/// The storage engine's complete capability snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageCapabilities {
    pub resources: BTreeMap<String, ResourceCapabilities>,
    pub system_interactions: HashSet<SystemInteraction>,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl StorageCapabilities {
    /// Renders a FHIR `CapabilityStatement.rest` entry for this snapshot.
    /// Producing the full `CapabilityStatement` resource (status, date,
    /// FHIR version, implementation details) is an HTTP-binding concern;
    /// this crate only knows about the `rest` fragment its own state
    /// determines.
    pub fn to_capability_rest(&self) -> Value {
        let resources: Vec<Value> = self
            .resources
            .values()
            .map(|caps| {
                let mut resource = serde_json::json!({
                    "type": caps.resource_type,
                    "interaction": caps.interactions.iter().map(|i| {
                        serde_json::json!({"code": i.to_string()})
                    }).collect::<Vec<_>>(),
                });
                if !caps.search_params.is_empty() {
                    resource["searchParam"] = serde_json::json!(caps
                        .search_params
                        .iter()
                        .map(|sp| serde_json::json!({
                            "name": sp.name,
                            "type": sp.param_type,
                        }))
                        .collect::<Vec<_>>());
                }
                if caps.conditional_create {
                    resource["conditionalCreate"] = Value::Bool(true);
                }
                if caps.conditional_update {
                    resource["conditionalUpdate"] = Value::Bool(true);
                }
                if caps.conditional_delete {
                    resource["conditionalDelete"] = Value::String("single".to_string());
                }
                resource
            })
            .collect();

        serde_json::json!({
            "mode": "server",
            "resource": resources,
            "interaction": self.system_interactions.iter().map(|i| {
                serde_json::json!({"code": i.to_string()})
            }).collect::<Vec<_>>(),
        })
    }
}

/// Implemented by the repository so callers can query capabilities without
/// threading the registries/config around separately.
pub trait CapabilityProvider {
    fn capabilities(&self) -> StorageCapabilities;

    fn supports_interaction(&self, resource_type: &str, interaction: Interaction) -> bool {
        self.capabilities()
            .resources
            .get(resource_type)
            .is_some_and(|r| r.interactions.contains(&interaction))
    }
}

/// Derives a capability snapshot from the registries and repository
/// configuration. Every resource type with at least one declared search
/// parameter gets full CRUD, versioning, and conditional-operation support
/// — the repository applies these uniformly across resource types, so
/// there is no separate per-type opt-in to read here.
pub fn derive_capabilities(registries: &Registries, config: &RepositoryConfig) -> StorageCapabilities {
    let mut resources = BTreeMap::new();

    for resource_type in registries.search_params().resource_types() {
        let params = registries.search_params().for_resource_type(resource_type);

        let mut interactions: HashSet<Interaction> = [
            Interaction::Read,
            Interaction::Vread,
            Interaction::Create,
            Interaction::Update,
            Interaction::Delete,
            Interaction::HistoryInstance,
            Interaction::HistoryType,
        ]
        .into_iter()
        .collect();
        if !params.is_empty() {
            interactions.insert(Interaction::SearchType);
        }

        let search_params = params
            .iter()
            .map(|p| SearchParamCapability {
                name: p.code.clone(),
                param_type: p.param_type,
                modifiers: modifiers_for(p.param_type),
                supports_chaining: p.param_type == SearchParamType::Reference,
            })
            .collect();

        resources.insert(
            resource_type.to_string(),
            ResourceCapabilities {
                resource_type: resource_type.to_string(),
                interactions,
                search_params,
                conditional_create: true,
                conditional_update: true,
                conditional_delete: true,
            },
        );
    }

    StorageCapabilities {
        resources,
        system_interactions: [SystemInteraction::Transaction, SystemInteraction::Batch]
            .into_iter()
            .collect(),
        default_page_size: config.default_count,
        max_page_size: config.max_count,
    }
}

fn modifiers_for(param_type: SearchParamType) -> Vec<String> {
    let raw: &[&str] = match param_type {
        SearchParamType::String => &["exact", "contains", "missing"],
        SearchParamType::Token => &["text", "not", "missing", "of-type", "above", "below", "in", "not-in"],
        SearchParamType::Reference => &["missing", "above", "below"],
        SearchParamType::Date | SearchParamType::Quantity | SearchParamType::Number => &["missing"],
        SearchParamType::Uri => &["below", "missing"],
    };
    raw.iter().map(|s| s.to_string()).collect()
}
