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

//! Test utilities for the REST API.

use crate::driver::Driver;
use crate::rest::app;
use axum::Router;
use natours_core::clocks::testutils::FixedClock;
use natours_core::db::documents::testutils::setup;
use natours_core::driver::resource::Repository;
use serde_json::{Value, json};
use std::sync::Arc;
use time::macros::datetime;

pub(crate) struct TestContext {
    driver: Driver,
    app: Router,
}

impl TestContext {
    pub(crate) async fn setup() -> Self {
        let db = setup().await;
        let clock = Arc::from(FixedClock::new(datetime!(2023-12-01 05:50:20 UTC)));
        let driver = Driver::new(db, clock);
        let app = app(driver.clone());
        Self { driver, app }
    }

    pub(crate) fn app(&self) -> Router {
        self.app.clone()
    }

    pub(crate) fn into_app(self) -> Router {
        self.app
    }

    /// Returns a valid tour payload with the given properties.
    pub(crate) fn tour_json(name: &str, price: f64, ratings_average: f64) -> Value {
        json!({
            "name": name,
            "duration": 5,
            "maxGroupSize": 10,
            "difficulty": "easy",
            "price": price,
            "ratingsAverage": ratings_average,
            "summary": format!("Summary of {}", name),
        })
    }

    async fn insert_tour(&self, payload: Value) -> String {
        let payload = payload.as_object().unwrap().clone();
        let record = self.driver.tours().create(payload).await.unwrap();
        record.get("id").unwrap().as_str().unwrap().to_owned()
    }

    /// Creates a valid tour and returns its identifier.
    pub(crate) async fn create_tour(&self, name: &str, price: f64, ratings_average: f64) -> String {
        self.insert_tour(Self::tour_json(name, price, ratings_average)).await
    }

    /// Creates a valid tour that starts on `start_dates` and returns its identifier.
    pub(crate) async fn create_tour_with_dates(&self, name: &str, start_dates: &[&str]) -> String {
        let mut payload = Self::tour_json(name, 100.0, 4.5);
        payload["startDates"] = json!(start_dates);
        self.insert_tour(payload).await
    }

    /// Creates a review of `tour` and returns its identifier.
    pub(crate) async fn create_review(&self, tour: &str, review: &str) -> String {
        let payload = json!({"review": review, "tour": tour});
        let payload = payload.as_object().unwrap().clone();
        let record = self.driver.reviews().create(payload).await.unwrap();
        record.get("id").unwrap().as_str().unwrap().to_owned()
    }

    /// Counts the tours in the database.
    pub(crate) async fn count_tours(&self) -> usize {
        self.driver.tours().find_all(&Default::default()).await.unwrap().len()
    }
}
