//! Search Compiler (§4.4): turns a [`SearchRequest`] into parameterised SQL.
//!
//! Every value is bound through a placeholder; column names come
//! exclusively from [`CanonicalSearchParameter::column_name`] and the
//! planner's `quote_ident`, matching the "no user value is ever inlined"
//! guarantee tested in §8.

use crate::error::SearchError;
use crate::indexer::convert::token_value;
use crate::planner::table_set::{quote_ident, TableSet};
use crate::registry::{CanonicalSearchParameter, IndexStrategy, Registries, SearchParamType};
use crate::repository::{CompiledSearch, SqlFragment, SqlParam};

use super::request::{SearchModifier, SearchParam, SearchPrefix, SearchRequest, TotalMode};

/// A non-fatal compilation outcome: an unknown parameter under a
/// non-strict context (§4.4 "Failure modes").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchWarning {
    pub code: String,
    pub message: String,
}

/// Tracks placeholder numbering while a predicate is assembled, so every
/// sub-builder can bind a value without knowing its absolute position.
#[derive(Debug, Default)]
struct FragmentBuilder {
    params: Vec<SqlParam>,
}

impl FragmentBuilder {
    fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }
}

/// Compiles parsed search requests into [`CompiledSearch`] values.
pub struct SearchCompiler<'a> {
    registries: &'a Registries,
}

impl<'a> SearchCompiler<'a> {
    pub fn new(registries: &'a Registries) -> Self {
        Self { registries }
    }

    /// Compiles `request` against its declared resource type. `strict`
    /// promotes unknown-parameter warnings to [`SearchError::UnknownParameter`].
    pub fn compile(
        &self,
        request: &SearchRequest,
        strict: bool,
    ) -> Result<(CompiledSearch, Vec<SearchWarning>), SearchError> {
        let mut builder = FragmentBuilder::default();
        let mut conditions = Vec::new();
        let mut warnings = Vec::new();

        for param in &request.params {
            match self.compile_param(&request.resource_type, param, &mut builder)? {
                Some(condition) => conditions.push(condition),
                None if strict => {
                    return Err(SearchError::UnknownParameter {
                        code: param.code.clone(),
                    })
                }
                None => warnings.push(SearchWarning {
                    code: "unknown-parameter".to_string(),
                    message: format!("unknown search parameter '{}'", param.code),
                }),
            }
        }

        let sql = if conditions.is_empty() {
            "TRUE".to_string()
        } else {
            conditions.join(" AND ")
        };

        let mut order_by = Vec::new();
        for sort in &request.sort {
            let column = self.sort_column(&request.resource_type, &sort.code)?;
            order_by.push(format!("{} {}", column, if sort.descending { "DESC" } else { "ASC" }));
        }

        let count = request.count.unwrap_or(20).min(1000);
        let offset = request.offset.unwrap_or(0);
        let include_total = matches!(request.total, TotalMode::Accurate);

        Ok((
            CompiledSearch {
                predicate: SqlFragment::new(sql, builder.params),
                order_by,
                count,
                offset,
                include_total,
            },
            warnings,
        ))
    }

    fn sort_column(&self, resource_type: &str, code: &str) -> Result<String, SearchError> {
        if code == "_lastUpdated" {
            return Ok(quote_ident("lastUpdated"));
        }
        if code == "_id" {
            return Ok(quote_ident("id"));
        }
        let param = self
            .registries
            .search_params()
            .get(resource_type, code)
            .ok_or_else(|| SearchError::UnknownParameter { code: code.to_string() })?;
        let column = match &param.strategy {
            IndexStrategy::TokenColumn => param.token_columns().2,
            _ => param.column_name(),
        };
        Ok(quote_ident(&column))
    }

    fn compile_param(
        &self,
        resource_type: &str,
        param: &SearchParam,
        builder: &mut FragmentBuilder,
    ) -> Result<Option<String>, SearchError> {
        if param.code == "_id" {
            return Ok(Some(self.compile_fixed_column(
                "id",
                SqlParamKind::Uuid,
                param,
                builder,
            )?));
        }
        if param.code == "_lastUpdated" {
            return Ok(Some(self.compile_fixed_column(
                "lastUpdated",
                SqlParamKind::Timestamp,
                param,
                builder,
            )?));
        }

        if let Some(chain_code) = &param.chain {
            return self.compile_chain(resource_type, param, chain_code, builder);
        }

        let Some(canonical) = self.registries.search_params().get(resource_type, &param.code) else {
            return Ok(None);
        };

        Ok(Some(self.compile_ordinary(&quote_ident(resource_type), canonical, param, builder)?))
    }

    fn compile_fixed_column(
        &self,
        column: &str,
        kind: SqlParamKind,
        param: &SearchParam,
        builder: &mut FragmentBuilder,
    ) -> Result<String, SearchError> {
        if param.modifier == Some(SearchModifier::Missing) {
            return Ok(missing_condition(&quote_ident(column), param)?);
        }
        let mut ors = Vec::new();
        for value in &param.values {
            let bound = match kind {
                SqlParamKind::Uuid => {
                    let uuid = uuid::Uuid::parse_str(&value.raw).map_err(|_| {
                        SearchError::MalformedRequest {
                            message: format!("invalid id value '{}'", value.raw),
                        }
                    })?;
                    builder.bind(SqlParam::Uuid(uuid))
                }
                SqlParamKind::Timestamp => {
                    let interval = crate::indexer::convert::parse_date_interval(&value.raw)
                        .map_err(|_| SearchError::MalformedRequest {
                            message: format!("invalid date value '{}'", value.raw),
                        })?;
                    builder.bind(SqlParam::TimestampTz(interval.lo))
                }
            };
            let op = value.prefix.operator().unwrap_or("=");
            ors.push(format!("{} {} {}", quote_ident(column), op, bound));
        }
        Ok(format!("({})", ors.join(" OR ")))
    }

    /// `table_ref` is either a quoted table name (ordinary search) or a
    /// bare join alias (the chained-search target table).
    fn compile_ordinary(
        &self,
        table_ref: &str,
        canonical: &CanonicalSearchParameter,
        param: &SearchParam,
        builder: &mut FragmentBuilder,
    ) -> Result<String, SearchError> {
        if param.modifier == Some(SearchModifier::Missing) {
            let column = match &canonical.strategy {
                IndexStrategy::LookupTable { table_name } | IndexStrategy::SharedToken { table_name } => {
                    return Ok(lookup_missing_condition(table_ref, table_name));
                }
                IndexStrategy::TokenColumn => canonical.token_columns().0,
                IndexStrategy::ScalarColumn => canonical.column_name(),
            };
            return missing_condition(&quote_ident(&column), param);
        }

        match &canonical.strategy {
            IndexStrategy::ScalarColumn => self.compile_scalar(canonical, param, builder),
            IndexStrategy::TokenColumn => self.compile_token(canonical, param, builder),
            IndexStrategy::LookupTable { table_name } | IndexStrategy::SharedToken { table_name } => {
                self.compile_lookup(table_ref, table_name, param, builder)
            }
        }
    }

    fn compile_scalar(
        &self,
        canonical: &CanonicalSearchParameter,
        param: &SearchParam,
        builder: &mut FragmentBuilder,
    ) -> Result<String, SearchError> {
        let column = quote_ident(&canonical.column_name());
        match canonical.param_type {
            SearchParamType::String => Ok(string_condition(&column, param, builder)),
            SearchParamType::Date => date_condition(&column, param, builder),
            SearchParamType::Number | SearchParamType::Quantity => {
                number_condition(&column, param, builder)
            }
            SearchParamType::Reference => Ok(reference_condition(&column, param, builder)),
            SearchParamType::Uri => Ok(uri_condition(&column, param, builder)),
            SearchParamType::Token => Ok(string_condition(&column, param, builder)),
        }
    }

    fn compile_token(
        &self,
        canonical: &CanonicalSearchParameter,
        param: &SearchParam,
        builder: &mut FragmentBuilder,
    ) -> Result<String, SearchError> {
        let (uuid_col, text_col, sort_col) = canonical.token_columns();
        let uuid_col = quote_ident(&uuid_col);
        let text_col = quote_ident(&text_col);
        let sort_col = quote_ident(&sort_col);

        if param.modifier == Some(SearchModifier::Text) {
            let mut ors = Vec::new();
            for value in &param.values {
                let bound = builder.bind(SqlParam::Text(format!("{}%", escape_like(&value.raw))));
                ors.push(format!("{} ILIKE {}", sort_col, bound));
            }
            return Ok(format!("({})", ors.join(" OR ")));
        }

        let mut ors = Vec::new();
        for value in &param.values {
            let condition = token_value_condition(&uuid_col, &text_col, &value.raw, builder);
            ors.push(condition);
        }
        let combined = format!("({})", ors.join(" OR "));
        if param.modifier == Some(SearchModifier::Not) {
            Ok(format!("NOT {combined}"))
        } else {
            Ok(combined)
        }
    }

    fn compile_lookup(
        &self,
        table_ref: &str,
        table_name: &str,
        param: &SearchParam,
        builder: &mut FragmentBuilder,
    ) -> Result<String, SearchError> {
        let table = quote_ident(table_name);
        let outer = table_ref;
        let mut ors = Vec::new();
        for value in &param.values {
            let pattern = match param.modifier {
                Some(SearchModifier::Exact) => value.raw.clone(),
                Some(SearchModifier::Contains) => format!("%{}%", escape_like(&value.raw)),
                _ => format!("{}%", escape_like(&value.raw)),
            };
            let op = if param.modifier == Some(SearchModifier::Exact) { "=" } else { "ILIKE" };
            let bound = builder.bind(SqlParam::Text(pattern));
            ors.push(format!(
                "EXISTS (SELECT 1 FROM {table} lt WHERE lt.{resource_col} = {outer}.id AND lt.value {op} {bound})",
                resource_col = quote_ident("resourceId"),
            ));
        }
        Ok(format!("({})", ors.join(" OR ")))
    }

    fn compile_chain(
        &self,
        resource_type: &str,
        param: &SearchParam,
        chain_code: &str,
        builder: &mut FragmentBuilder,
    ) -> Result<Option<String>, SearchError> {
        let Some((target_type, target_param)) = self.resolve_chain_target(chain_code) else {
            return Ok(None);
        };

        let inner_param = SearchParam {
            code: chain_code.to_string(),
            modifier: param.modifier,
            chain: None,
            values: param.values.clone(),
        };
        // Unqualified column references inside the EXISTS subquery resolve
        // against `t` (the target table) since the references table never
        // declares a column of the same name.
        let inner_condition = self.compile_ordinary("t", target_param, &inner_param, builder)?;

        let references_table = quote_ident(&TableSet::references_table_name(resource_type));
        let target_table = quote_ident(target_type);
        let source_table = quote_ident(resource_type);
        let code_bound = builder.bind(SqlParam::Text(param.code.clone()));

        Ok(Some(format!(
            "EXISTS (SELECT 1 FROM {references_table} r JOIN {target_table} t ON t.id = r.{target_col} \
             WHERE r.{resource_col} = {source_table}.id AND r.code = {code_bound} AND ({inner_condition}))",
            target_col = quote_ident("targetId"),
            resource_col = quote_ident("resourceId"),
        )))
    }

    /// Finds the (deterministically first, by resource type name) registry
    /// entry declaring `code`, used to resolve a chained search's target
    /// table and strategy.
    fn resolve_chain_target(&self, code: &str) -> Option<(&str, &CanonicalSearchParameter)> {
        for resource_type in self.registries.search_params().resource_types() {
            if let Some(p) = self.registries.search_params().get(resource_type, code) {
                return Some((resource_type, p));
            }
        }
        None
    }
}

enum SqlParamKind {
    Uuid,
    Timestamp,
}

fn missing_condition(column: &str, param: &SearchParam) -> Result<String, SearchError> {
    let value = param
        .values
        .first()
        .ok_or_else(|| SearchError::MalformedRequest {
            message: "missing modifier requires a true/false value".to_string(),
        })?;
    match value.raw.as_str() {
        "true" => Ok(format!("{column} IS NULL")),
        "false" => Ok(format!("{column} IS NOT NULL")),
        other => Err(SearchError::MalformedRequest {
            message: format!("invalid :missing value '{other}'"),
        }),
    }
}

fn lookup_missing_condition(table_ref: &str, table_name: &str) -> String {
    format!(
        "NOT EXISTS (SELECT 1 FROM {table} lt WHERE lt.{resource_col} = {table_ref}.id)",
        table = quote_ident(table_name),
        resource_col = quote_ident("resourceId"),
    )
}

fn string_condition(column: &str, param: &SearchParam, builder: &mut FragmentBuilder) -> String {
    let mut ors = Vec::new();
    for value in &param.values {
        let pattern = match param.modifier {
            Some(SearchModifier::Exact) => value.raw.clone(),
            Some(SearchModifier::Contains) => format!("%{}%", escape_like(&value.raw)),
            _ => format!("{}%", escape_like(&value.raw)),
        };
        let bound = builder.bind(SqlParam::Text(pattern));
        let condition = if param.modifier == Some(SearchModifier::Exact) {
            format!("{column} = {bound}")
        } else {
            format!("LOWER({column}) LIKE LOWER({bound})")
        };
        ors.push(condition);
    }
    format!("({})", ors.join(" OR "))
}

fn uri_condition(column: &str, param: &SearchParam, builder: &mut FragmentBuilder) -> String {
    let mut ors = Vec::new();
    for value in &param.values {
        match param.modifier {
            Some(SearchModifier::Below) => {
                let bound = builder.bind(SqlParam::Text(format!("{}%", escape_like(&value.raw))));
                ors.push(format!("{column} LIKE {bound}"));
            }
            Some(SearchModifier::Above) => {
                let bound = builder.bind(SqlParam::Text(value.raw.clone()));
                ors.push(format!("{bound} LIKE ({column} || '%')"));
            }
            _ => {
                let bound = builder.bind(SqlParam::Text(value.raw.clone()));
                ors.push(format!("{column} = {bound}"));
            }
        }
    }
    format!("({})", ors.join(" OR "))
}

fn reference_condition(column: &str, param: &SearchParam, builder: &mut FragmentBuilder) -> String {
    let mut ors = Vec::new();
    for value in &param.values {
        let bound = builder.bind(SqlParam::Text(value.raw.clone()));
        ors.push(format!("{column} = {bound}"));
    }
    format!("({})", ors.join(" OR "))
}

fn date_condition(
    column: &str,
    param: &SearchParam,
    builder: &mut FragmentBuilder,
) -> Result<String, SearchError> {
    let mut ors = Vec::new();
    for value in &param.values {
        let interval = crate::indexer::convert::parse_date_interval(&value.raw).map_err(|_| {
            SearchError::MalformedRequest {
                message: format!("invalid date value '{}'", value.raw),
            }
        })?;
        let condition = match value.prefix {
            SearchPrefix::Ap => {
                let lo = builder.bind(SqlParam::TimestampTz(interval.lo - chrono::Duration::days(1)));
                let hi = builder.bind(SqlParam::TimestampTz(interval.hi + chrono::Duration::days(1)));
                format!("{column} BETWEEN {lo} AND {hi}")
            }
            other => {
                let op = other.operator().unwrap_or("=");
                let bound = builder.bind(SqlParam::TimestampTz(interval.lo));
                format!("{column} {op} {bound}")
            }
        };
        ors.push(condition);
    }
    Ok(format!("({})", ors.join(" OR ")))
}

fn number_condition(
    column: &str,
    param: &SearchParam,
    builder: &mut FragmentBuilder,
) -> Result<String, SearchError> {
    let mut ors = Vec::new();
    for value in &param.values {
        let decimal: rust_decimal::Decimal = value.raw.parse().map_err(|_| SearchError::MalformedRequest {
            message: format!("invalid numeric value '{}'", value.raw),
        })?;
        let condition = match value.prefix {
            SearchPrefix::Ap => {
                let tenth = decimal * rust_decimal::Decimal::new(1, 1);
                let lo = builder.bind(SqlParam::Numeric(decimal - tenth));
                let hi = builder.bind(SqlParam::Numeric(decimal + tenth));
                format!("{column} BETWEEN {lo} AND {hi}")
            }
            other => {
                let op = other.operator().unwrap_or("=");
                let bound = builder.bind(SqlParam::Numeric(decimal));
                format!("{column} {op} {bound}")
            }
        };
        ors.push(condition);
    }
    Ok(format!("({})", ors.join(" OR ")))
}

fn token_value_condition(
    uuid_col: &str,
    text_col: &str,
    raw: &str,
    builder: &mut FragmentBuilder,
) -> String {
    if let Some((system, code)) = raw.split_once('|') {
        if system.is_empty() {
            bare_code_condition(text_col, code, builder)
        } else if code.is_empty() {
            let bound = builder.bind(SqlParam::Text(format!("{}|%", escape_like(system))));
            format!(
                "EXISTS (SELECT 1 FROM unnest({text_col}) AS tok WHERE tok LIKE {bound})"
            )
        } else {
            let token = token_value(Some(system), Some(code));
            let bound = builder.bind(SqlParam::UuidArray(vec![token.hash]));
            format!("{uuid_col} && {bound}")
        }
    } else {
        bare_code_condition(text_col, raw, builder)
    }
}

fn bare_code_condition(text_col: &str, code: &str, builder: &mut FragmentBuilder) -> String {
    let bound = builder.bind(SqlParam::Text(format!("%|{}", escape_like(code))));
    format!("EXISTS (SELECT 1 FROM unnest({text_col}) AS tok WHERE tok LIKE {bound})")
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
