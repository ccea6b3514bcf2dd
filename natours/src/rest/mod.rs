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

//! Entry point to the REST server.

use crate::driver::Driver;
use crate::model::Review;
use axum::Router;
use natours_core::driver::resource::{Expansion, Resource};
use natours_core::rest::resource::ResourceRoutes;

mod monthly_plan_get;
#[cfg(test)]
mod testutils;
mod tour_stats_get;
mod tours_top_get;

/// Creates the router for the application.
pub(crate) fn app(driver: Driver) -> Router {
    use axum::routing::get;

    let tours = ResourceRoutes::new(driver.tours())
        .with_expansion(Expansion::new("reviews", Review::COLLECTION, "tour"));
    let reviews = ResourceRoutes::new(driver.reviews());

    Router::new()
        .route("/api/v1/tours/top-5-cheap", get(tours_top_get::handler))
        .route("/api/v1/tours/tour-stats", get(tour_stats_get::handler))
        .route("/api/v1/tours/monthly-plan/:year", get(monthly_plan_get::handler))
        .route("/api/v1/tours", tours.collection())
        .route("/api/v1/tours/:id", tours.member())
        .route("/api/v1/tours/:id/reviews", reviews.scoped_collection("tour"))
        .route("/api/v1/reviews", reviews.collection())
        .route("/api/v1/reviews/:id", reviews.member())
        .with_state(driver)
}
