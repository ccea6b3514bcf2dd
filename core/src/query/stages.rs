// III-IV
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Stages of the query pipeline.

use crate::query::{
    ComparisonOp, FieldName, Literal, Page, ParamValue, Predicate, Projection, QueryError,
    QueryParams, QueryResult, QuerySpec, RESERVED_PARAMS, SortDirection, SortKey,
};
use log::debug;

/// Page returned when the caller does not provide a valid `page` parameter.
pub const DEFAULT_PAGE: u64 = 1;

/// Page size used when the caller does not provide a valid `limit` parameter.
pub const DEFAULT_LIMIT: u64 = 100;

/// Signature of a pipeline stage.
pub type Stage = fn(QuerySpec, &QueryParams) -> QueryResult<QuerySpec>;

/// All pipeline stages in the order in which they must run.
pub const STAGES: [(&str, Stage); 4] = [
    ("filter", filter as Stage),
    ("sort", sort as Stage),
    ("limit_fields", limit_fields as Stage),
    ("paginate", paginate as Stage),
];

/// Runs all pipeline stages over `spec`, which may already carry predicates from an enclosing
/// scope, using the request's `params`.
pub fn pipeline(spec: QuerySpec, params: &QueryParams) -> QueryResult<QuerySpec> {
    STAGES.iter().try_fold(spec, |spec, (name, stage)| {
        let spec = stage(spec, params)?;
        debug!("Query after {} stage: {:?}", name, spec);
        Ok(spec)
    })
}

/// Splits a comma-separated control parameter into its non-empty items.
fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Builds the exact-match predicate for `field` given its `raw` query string values.
fn equality<'a, I: IntoIterator<Item = &'a str>>(field: FieldName, raw: I) -> Predicate {
    let mut values = raw.into_iter().flat_map(Literal::candidates).collect::<Vec<Literal>>();
    if values.len() == 1 {
        Predicate::eq(field, values.swap_remove(0))
    } else {
        Predicate::AnyOf { field, values }
    }
}

/// Converts all non-reserved parameters into predicates.
pub fn filter(mut spec: QuerySpec, params: &QueryParams) -> QueryResult<QuerySpec> {
    for (key, value) in params.iter() {
        if RESERVED_PARAMS.contains(&key) {
            continue;
        }

        let field = FieldName::new(key)?;
        match value {
            ParamValue::Single(value) => {
                spec = spec.with_predicate(equality(field, [value.as_str()]));
            }

            ParamValue::List(values) => {
                spec = spec.with_predicate(equality(field, values.iter().map(String::as_str)));
            }

            ParamValue::Operators(ops) => {
                for (token, value) in ops {
                    let op = ComparisonOp::from_token(token)?;
                    if op == ComparisonOp::Eq {
                        spec = spec.with_predicate(equality(field.clone(), [value.as_str()]));
                        continue;
                    }

                    let value = Literal::infer(value);
                    if !value.is_numeric() {
                        return Err(QueryError(format!(
                            "Invalid value for {}[{}]: expected a number",
                            field, token
                        )));
                    }
                    spec =
                        spec.with_predicate(Predicate::Compare { field: field.clone(), op, value });
                }
            }
        }
    }
    Ok(spec)
}

/// Converts the `sort` parameter into sort keys.
pub fn sort(mut spec: QuerySpec, params: &QueryParams) -> QueryResult<QuerySpec> {
    let Some(raw) = params.control("sort") else {
        return Ok(spec);
    };

    for item in split_list(raw) {
        let key = match item.strip_prefix('-') {
            Some(name) => {
                SortKey { field: FieldName::new(name)?, direction: SortDirection::Descending }
            }
            None => SortKey { field: FieldName::new(item)?, direction: SortDirection::Ascending },
        };
        spec = spec.with_sort_key(key);
    }
    Ok(spec)
}

/// Converts the `fields` parameter into a projection.
pub fn limit_fields(spec: QuerySpec, params: &QueryParams) -> QueryResult<QuerySpec> {
    let Some(raw) = params.control("fields") else {
        return Ok(spec.with_projection(Projection::hide_internal()));
    };

    let mut include = vec![];
    let mut exclude = vec![];
    for item in split_list(raw) {
        match item.strip_prefix('-') {
            Some(name) => exclude.push(FieldName::new(name)?),
            None => include.push(FieldName::new(item)?),
        }
    }

    let projection = match (include.is_empty(), exclude.is_empty()) {
        (true, true) => Projection::hide_internal(),
        (false, true) => Projection::Include(include),
        (true, false) => Projection::Exclude(exclude),
        (false, false) => {
            return Err(QueryError(format!(
                "Cannot mix included and excluded fields in '{}'",
                raw
            )));
        }
    };
    Ok(spec.with_projection(projection))
}

/// Parses the positive integer control parameter `key`, falling back to `default`.
fn positive_or(params: &QueryParams, key: &str, default: u64) -> u64 {
    match params.control(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(n) if n > 0 => n,
            _ => {
                debug!("Ignoring invalid {} value '{}'; using {}", key, raw, default);
                default
            }
        },
    }
}

/// Converts the `page` and `limit` parameters into a page.
pub fn paginate(spec: QuerySpec, params: &QueryParams) -> QueryResult<QuerySpec> {
    let page = positive_or(params, "page", DEFAULT_PAGE);
    let limit = positive_or(params, "limit", DEFAULT_LIMIT);
    let skip = (page - 1).saturating_mul(limit);
    Ok(spec.with_page(Page { skip, limit }))
}
