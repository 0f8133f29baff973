//! The search URL grammar parser (§6).
//!
//! Parses a flat list of query pairs, as already percent-decoded by the
//! HTTP binding (out of scope here), into a [`SearchRequest`]. Reserved
//! control parameters (`_count`, `_offset`, `_sort`, `_total`, `_include`,
//! `_revinclude`) are consumed directly; everything else becomes an
//! ordinary [`SearchParam`] for the compiler to resolve against the
//! registry.

use crate::error::SearchError;

use super::request::{
    IncludeDirective, SearchModifier, SearchParam, SearchPrefix, SearchRequest, SearchValue,
    SortRule, TotalMode,
};

const RESERVED: &[&str] = &[
    "_count",
    "_offset",
    "_sort",
    "_total",
    "_include",
    "_revinclude",
];

/// Parses `query` (already-decoded `(name, value)` pairs) into a
/// [`SearchRequest`] for `resource_type`.
pub fn parse_search_request(
    resource_type: &str,
    query: &[(String, String)],
) -> Result<SearchRequest, SearchError> {
    let mut request = SearchRequest::new(resource_type);

    for (name, value) in query {
        let (code_part, modifier_part) = split_modifier(name);

        if RESERVED.contains(&code_part) {
            apply_control_param(&mut request, code_part, value)?;
            continue;
        }

        let modifier = match modifier_part {
            Some(token) => Some(SearchModifier::parse(token).ok_or_else(|| SearchError::UnknownModifier {
                code: code_part.to_string(),
                modifier: token.to_string(),
            })?),
            None => None,
        };

        let (base_code, chain) = split_chain(code_part)?;

        let values = value
            .split(',')
            .map(parse_value)
            .collect::<Result<Vec<_>, _>>()?;

        request.params.push(SearchParam {
            code: base_code.to_string(),
            modifier,
            chain: chain.map(str::to_string),
            values,
        });
    }

    Ok(request)
}

fn split_modifier(name: &str) -> (&str, Option<&str>) {
    match name.split_once(':') {
        Some((code, modifier)) => (code, Some(modifier)),
        None => (name, None),
    }
}

fn split_chain(code: &str) -> Result<(&str, Option<&str>), SearchError> {
    match code.split_once('.') {
        Some((base, rest)) if rest.contains('.') => Err(SearchError::ChainTooDeep {
            chain: code.to_string(),
        }),
        Some((base, rest)) => Ok((base, Some(rest))),
        None => Ok((code, None)),
    }
}

fn parse_value(raw: &str) -> Result<SearchValue, SearchError> {
    if raw.len() >= 2 {
        let (head, tail) = raw.split_at(2);
        if let Some(prefix) = SearchPrefix::parse(head) {
            if !tail.is_empty() {
                return Ok(SearchValue {
                    prefix,
                    raw: tail.to_string(),
                });
            }
        }
    }
    Ok(SearchValue {
        prefix: SearchPrefix::Eq,
        raw: raw.to_string(),
    })
}

fn apply_control_param(
    request: &mut SearchRequest,
    name: &str,
    value: &str,
) -> Result<(), SearchError> {
    match name {
        "_count" => {
            request.count = Some(value.parse().map_err(|_| SearchError::MalformedRequest {
                message: format!("invalid _count value '{value}'"),
            })?);
        }
        "_offset" => {
            request.offset = Some(value.parse().map_err(|_| SearchError::MalformedRequest {
                message: format!("invalid _offset value '{value}'"),
            })?);
        }
        "_sort" => {
            for token in value.split(',') {
                let (descending, code) = match token.strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, token),
                };
                request.sort.push(SortRule {
                    code: code.to_string(),
                    descending,
                });
            }
        }
        "_total" => {
            request.total = TotalMode::parse(value).ok_or_else(|| SearchError::MalformedRequest {
                message: format!("invalid _total value '{value}'"),
            })?;
        }
        "_include" => request.include.push(parse_include(value)?),
        "_revinclude" => request.revinclude.push(parse_include(value)?),
        other => {
            return Err(SearchError::MalformedRequest {
                message: format!("unhandled control parameter '{other}'"),
            })
        }
    }
    Ok(())
}

fn parse_include(value: &str) -> Result<IncludeDirective, SearchError> {
    let (body, iterate) = match value.strip_suffix(":iterate") {
        Some(rest) => (rest, true),
        None => (value, false),
    };
    let mut parts = body.splitn(3, ':');
    let source_type = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SearchError::MalformedRequest {
            message: format!("malformed include directive '{value}'"),
        })?;
    let search_param = parts.next().ok_or_else(|| SearchError::MalformedRequest {
        message: format!("malformed include directive '{value}'"),
    })?;
    let target_type = parts.next().map(str::to_string);
    Ok(IncludeDirective {
        source_type: source_type.to_string(),
        search_param: search_param.to_string(),
        target_type,
        iterate,
    })
}
