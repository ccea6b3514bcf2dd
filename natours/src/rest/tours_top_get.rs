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

//! API to get the five best and cheapest tours.

use crate::driver::Driver;
use axum::extract::{RawQuery, State};
use axum::response::Response;
use natours_core::query::{QueryParams, QuerySpec};
use natours_core::rest::resource::list_records;
use natours_core::rest::{EmptyBody, RestResult};

/// API handler.
///
/// Accepts the same parameters as the tours list but overrides the page size, the sort order and
/// the returned fields.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    RawQuery(query): RawQuery,
    _: EmptyBody,
) -> RestResult<Response> {
    let params = QueryParams::parse(query.as_deref())?
        .with("limit", "5")
        .with("sort", "-ratingsAverage,price")
        .with("fields", "name,price,ratingsAverage,summary,difficulty");
    let tours = driver.tours();
    list_records(tours.as_ref(), QuerySpec::default(), &params).await
}
