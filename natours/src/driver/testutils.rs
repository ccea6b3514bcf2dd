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

//! Test utilities for the business layer.

use crate::driver::Driver;
use natours_core::clocks::testutils::FixedClock;
use natours_core::db::documents::testutils::setup;
use natours_core::driver::resource::Repository;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use time::macros::datetime;

/// Extracts the JSON object in `value`.
pub(crate) fn object(value: Value) -> Map<String, Value> {
    value.as_object().unwrap().clone()
}

pub(crate) struct TestContext {
    clock: Arc<FixedClock>,
    driver: Driver,
}

impl TestContext {
    pub(crate) async fn setup() -> Self {
        let db = setup().await;
        let clock = Arc::from(FixedClock::new(datetime!(2023-12-01 05:50:20 UTC)));
        let driver = Driver::new(db, clock.clone());
        Self { clock, driver }
    }

    pub(crate) fn clock(&self) -> &FixedClock {
        &self.clock
    }

    pub(crate) fn driver(&self) -> Driver {
        self.driver.clone()
    }

    /// Creates a valid tour and returns its identifier.
    pub(crate) async fn create_tour(
        &self,
        name: &str,
        difficulty: &str,
        price: f64,
        ratings_average: f64,
        ratings_quantity: u32,
        start_dates: &[&str],
    ) -> String {
        let payload = json!({
            "name": name,
            "duration": 5,
            "maxGroupSize": 10,
            "difficulty": difficulty,
            "price": price,
            "ratingsAverage": ratings_average,
            "ratingsQuantity": ratings_quantity,
            "summary": format!("Summary of {}", name),
            "startDates": start_dates,
        });
        let record = self.driver.tours().create(object(payload)).await.unwrap();
        record.get("id").unwrap().as_str().unwrap().to_owned()
    }
}
