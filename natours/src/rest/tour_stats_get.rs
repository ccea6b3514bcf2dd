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

//! API to get the statistics of the best rated tours.

use crate::driver::{DifficultyStats, Driver};
use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use natours_core::rest::{EmptyBody, RestError, STATUS_SUCCESS};
use serde::{Deserialize, Serialize};

/// Payload of the response.
#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct StatsData {
    /// One entry per difficulty level.
    pub(crate) stats: Vec<DifficultyStats>,
}

/// Response of the API.
#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct StatsResponse {
    /// Always `success`.
    pub(crate) status: String,

    /// The payload.
    pub(crate) data: StatsData,
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    _: EmptyBody,
) -> Result<impl IntoResponse, RestError> {
    let stats = driver.tour_stats().await?;
    Ok(Json(StatsResponse { status: STATUS_SUCCESS.to_owned(), data: StatsData { stats } }))
}
