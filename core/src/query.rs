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

//! Translation of query strings into queries over a collection of documents.
//!
//! A list request carries its query parameters in the URL, such as in
//! `GET /api/v1/tours?difficulty=easy&price[lt]=1500&sort=-price,name&fields=name,price&page=2`.
//! This module parses those parameters into a `QueryParams` map and then runs the `pipeline`,
//! which is an ordered list of pure stages that each refine a `QuerySpec`:
//!
//! 1.  `filter` turns every non-reserved parameter into a predicate.
//! 1.  `sort` turns the `sort` parameter into sort keys.
//! 1.  `limit_fields` turns the `fields` parameter into a projection.
//! 1.  `paginate` turns the `page` and `limit` parameters into a skip/limit window.
//!
//! The resulting `QuerySpec` is a plain value that the persistence layer executes.

mod params;
pub use params::{ParamValue, QueryParams, RESERVED_PARAMS};
mod spec;
pub use spec::{
    ComparisonOp, FieldName, Literal, Page, Predicate, Projection, QuerySpec, SortDirection,
    SortKey,
};
mod stages;
pub use stages::{
    DEFAULT_LIMIT, DEFAULT_PAGE, STAGES, Stage, filter, limit_fields, paginate, pipeline, sort,
};

/// Errors caused by malformed query parameters.
#[derive(Debug, PartialEq, thiserror::Error)]
#[error("Invalid query: {0}")]
pub struct QueryError(pub String);

/// Result type for this module.
pub type QueryResult<T> = Result<T, QueryError>;
