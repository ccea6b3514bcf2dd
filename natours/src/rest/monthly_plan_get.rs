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

//! API to get the busiest months of a year.

use crate::driver::{Driver, MonthlyPlan};
use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use natours_core::rest::{EmptyBody, RestError, STATUS_SUCCESS};
use serde::{Deserialize, Serialize};

/// Payload of the response.
#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct PlanData {
    /// One entry per month, busiest first.
    pub(crate) plan: Vec<MonthlyPlan>,
}

/// Response of the API.
#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct PlanResponse {
    /// Always `success`.
    pub(crate) status: String,

    /// The payload.
    pub(crate) data: PlanData,
}

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path(year): Path<String>,
    _: EmptyBody,
) -> Result<impl IntoResponse, RestError> {
    let year = year
        .parse::<i32>()
        .map_err(|e| RestError::InvalidRequest(format!("Invalid year '{}': {}", year, e)))?;
    let plan = driver.monthly_plan(year).await?;
    Ok(Json(PlanResponse { status: STATUS_SUCCESS.to_owned(), data: PlanData { plan } }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::testutils::*;
    use axum::http;
    use natours_core::rest::testutils::*;

    fn route(year: &str) -> (http::Method, String) {
        (http::Method::GET, format!("/api/v1/tours/monthly-plan/{}", year))
    }

    #[tokio::test]
    async fn test_ok() {
        let context = TestContext::setup().await;
        context.create_tour_with_dates("The Forest Hiker", &["2021-04-25", "2021-07-20"]).await;
        context.create_tour_with_dates("The Sea Explorer", &["2021-07-19", "2022-01-01"]).await;

        let response = OneShotBuilder::new(context.app(), route("2021"))
            .send_empty()
            .await
            .expect_json::<PlanResponse>()
            .await;
        assert_eq!("success", response.status);
        assert_eq!(
            vec![
                MonthlyPlan {
                    num_tour_starts: 2,
                    tours: vec!["The Forest Hiker".to_owned(), "The Sea Explorer".to_owned()],
                    month: 7,
                },
                MonthlyPlan {
                    num_tour_starts: 1,
                    tours: vec!["The Forest Hiker".to_owned()],
                    month: 4,
                },
            ],
            response.data.plan
        );
    }

    #[tokio::test]
    async fn test_bad_year() {
        let context = TestContext::setup().await;

        OneShotBuilder::new(context.into_app(), route("next"))
            .send_empty()
            .await
            .expect_status(http::StatusCode::BAD_REQUEST)
            .expect_error("Invalid year 'next'")
            .await;
    }

    test_payload_must_be_empty!(TestContext::setup().await.into_app(), route("2021"));
}
