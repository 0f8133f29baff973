//! The parsed search request model (§4.4, §6 grammar).

use uuid::Uuid;

use crate::project::ProjectId;

/// Prefix → operator mapping applied to a single search value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPrefix {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Sa,
    Eb,
    Ap,
}

impl SearchPrefix {
    /// Parses the two-letter FHIR prefix token, case-sensitively.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "lt" => Some(Self::Lt),
            "gt" => Some(Self::Gt),
            "le" => Some(Self::Le),
            "ge" => Some(Self::Ge),
            "sa" => Some(Self::Sa),
            "eb" => Some(Self::Eb),
            "ap" => Some(Self::Ap),
            _ => None,
        }
    }

    /// The plain comparison operator this prefix maps to; `Ap` has no
    /// single operator and is handled as a BETWEEN range by the compiler.
    pub fn operator(&self) -> Option<&'static str> {
        match self {
            Self::Eq => Some("="),
            Self::Ne => Some("<>"),
            Self::Lt => Some("<"),
            Self::Gt => Some(">"),
            Self::Le => Some("<="),
            Self::Ge => Some(">="),
            Self::Sa => Some(">"),
            Self::Eb => Some("<"),
            Self::Ap => None,
        }
    }
}

/// A modifier attached to a search parameter code (`code:modifier=...`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchModifier {
    Exact,
    Contains,
    Missing,
    Not,
    Text,
    Above,
    Below,
    In,
    NotIn,
    OfType,
}

impl SearchModifier {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "exact" => Some(Self::Exact),
            "contains" => Some(Self::Contains),
            "missing" => Some(Self::Missing),
            "not" => Some(Self::Not),
            "text" => Some(Self::Text),
            "above" => Some(Self::Above),
            "below" => Some(Self::Below),
            "in" => Some(Self::In),
            "not-in" => Some(Self::NotIn),
            "of-type" => Some(Self::OfType),
            _ => None,
        }
    }
}

/// One value within a parameter's OR-joined value list, still carrying its
/// own prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchValue {
    pub prefix: SearchPrefix,
    pub raw: String,
}

/// One search parameter as it appeared on the wire: a code, an optional
/// modifier, an optional single-level chain target, and its OR-joined
/// value list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParam {
    pub code: String,
    pub modifier: Option<SearchModifier>,
    pub chain: Option<String>,
    pub values: Vec<SearchValue>,
}

/// A single `_sort` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortRule {
    pub code: String,
    pub descending: bool,
}

/// How `_total` should be computed, per §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TotalMode {
    #[default]
    None,
    Estimate,
    Accurate,
}

impl TotalMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "none" => Some(Self::None),
            "estimate" => Some(Self::Estimate),
            "accurate" => Some(Self::Accurate),
            _ => None,
        }
    }
}

/// One `_include`/`_revinclude` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    pub source_type: String,
    pub search_param: String,
    pub target_type: Option<String>,
    pub iterate: bool,
}

/// A fully parsed search request, ready for [`super::compile::SearchCompiler`]
/// (§4.4's request model).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub resource_type: String,
    pub params: Vec<SearchParam>,
    pub count: Option<u32>,
    pub offset: Option<u32>,
    pub sort: Vec<SortRule>,
    pub total: TotalMode,
    pub include: Vec<IncludeDirective>,
    pub revinclude: Vec<IncludeDirective>,
    pub compartment: Option<(String, Uuid)>,
    pub project: Option<ProjectId>,
}

impl SearchRequest {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            params: Vec::new(),
            count: None,
            offset: None,
            sort: Vec::new(),
            total: TotalMode::None,
            include: Vec::new(),
            revinclude: Vec::new(),
            compartment: None,
            project: None,
        }
    }
}
