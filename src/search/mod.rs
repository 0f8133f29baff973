//! Search Compiler (§4.4).
//!
//! Turns the URL grammar (§6) into a [`crate::repository::CompiledSearch`]
//! the repository executes unmodified. Parsing (`parse`) and compilation
//! (`compile`) are split so a caller that already has a structured request
//! (e.g. from a `POST {Type}/_search` form body, parsed by a collaborator
//! outside this crate) can skip straight to `compile`.

pub mod compile;
pub mod parse;
pub mod request;

pub use compile::{SearchCompiler, SearchWarning};
pub use parse::parse_search_request;
pub use request::{
    IncludeDirective, SearchModifier, SearchParam, SearchPrefix, SearchRequest, SearchValue,
    SortRule, TotalMode,
};
