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

//! Aggregated views over the tours.

use crate::driver::Driver;
use crate::model::Tour;
use log::debug;
use natours_core::driver::resource::Repository;
use natours_core::driver::{DriverError, DriverResult};
use natours_core::model::Record;
use natours_core::query::{ComparisonOp, FieldName, Literal, Predicate, QuerySpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Minimum average rating of the tours considered by `Driver::tour_stats`.
const MIN_STATS_RATING: f64 = 4.5;

/// Maximum number of months returned by `Driver::monthly_plan`.
const MAX_PLAN_MONTHS: usize = 6;

/// Statistics of the tours of one difficulty level.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DifficultyStats {
    /// Upper-cased difficulty level that identifies the group.
    #[serde(rename = "_id")]
    pub(crate) id: String,

    /// Number of tours in the group.
    pub(crate) num_tours: u64,

    /// Sum of the number of ratings of all tours in the group.
    pub(crate) num_ratings: u64,

    /// Mean of the average ratings of the tours in the group.
    pub(crate) avg_rating: f64,

    /// Mean price of the tours in the group.
    pub(crate) avg_price: f64,

    /// Lowest price in the group.
    pub(crate) min_price: f64,

    /// Highest price in the group.
    pub(crate) max_price: f64,
}

/// Tours that start in one month.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MonthlyPlan {
    /// Number of tour starts in the month.
    pub(crate) num_tour_starts: u64,

    /// Names of the tours starting in the month, once per start.
    pub(crate) tours: Vec<String>,

    /// Month number, from 1 to 12.
    pub(crate) month: u8,
}

/// Converts a stored `record` back into a tour.
fn to_tour(record: Record) -> DriverResult<Tour> {
    serde_json::from_value(Value::Object(record.into_map()))
        .map_err(|e| DriverError::BackendError(format!("Stored tour is invalid: {}", e)))
}

impl Driver {
    /// Computes the statistics of highly-rated tours grouped by difficulty, sorted by increasing
    /// average price.
    pub(crate) async fn tour_stats(self) -> DriverResult<Vec<DifficultyStats>> {
        let spec = QuerySpec::default().with_predicate(Predicate::Compare {
            field: FieldName::from("ratingsAverage"),
            op: ComparisonOp::Gte,
            value: Literal::Float(MIN_STATS_RATING),
        });
        let records = self.tours().find_all(&spec).await?;
        debug!("Computing tour stats over {} tours", records.len());

        let mut groups: BTreeMap<String, (DifficultyStats, f64)> = BTreeMap::new();
        for record in records {
            let tour = to_tour(record)?;
            let id = tour.difficulty().as_str().to_uppercase();
            let (stats, rating_sum) = groups.entry(id.clone()).or_insert_with(|| {
                let stats = DifficultyStats {
                    id,
                    num_tours: 0,
                    num_ratings: 0,
                    avg_rating: 0.0,
                    avg_price: 0.0,
                    min_price: f64::INFINITY,
                    max_price: f64::NEG_INFINITY,
                };
                (stats, 0.0)
            });
            stats.num_tours += 1;
            stats.num_ratings += u64::from(*tour.ratings_quantity());
            *rating_sum += tour.ratings_average();
            stats.avg_price += tour.price();
            stats.min_price = stats.min_price.min(*tour.price());
            stats.max_price = stats.max_price.max(*tour.price());
        }

        let mut stats = groups
            .into_values()
            .map(|(mut stats, rating_sum)| {
                let count = stats.num_tours as f64;
                stats.avg_rating = rating_sum / count;
                stats.avg_price /= count;
                stats
            })
            .collect::<Vec<DifficultyStats>>();
        stats.sort_by(|a, b| a.avg_price.total_cmp(&b.avg_price));
        Ok(stats)
    }

    /// Computes how many tours start in every month of `year`, keeping the busiest months only.
    pub(crate) async fn monthly_plan(self, year: i32) -> DriverResult<Vec<MonthlyPlan>> {
        let records = self.tours().find_all(&QuerySpec::default()).await?;
        debug!("Computing monthly plan for {} over {} tours", year, records.len());

        let mut months: BTreeMap<u8, MonthlyPlan> = BTreeMap::new();
        for record in records {
            let tour = to_tour(record)?;
            for start in tour.start_dates() {
                let date = start.date();
                if date.year() != year {
                    continue;
                }
                let month = u8::from(date.month());
                let plan = months.entry(month).or_insert_with(|| MonthlyPlan {
                    num_tour_starts: 0,
                    tours: vec![],
                    month,
                });
                plan.num_tour_starts += 1;
                plan.tours.push(tour.name().clone());
            }
        }

        // Ties keep increasing month order because the sort is stable.
        let mut plan = months.into_values().collect::<Vec<MonthlyPlan>>();
        plan.sort_by(|a, b| b.num_tour_starts.cmp(&a.num_tour_starts));
        plan.truncate(MAX_PLAN_MONTHS);
        Ok(plan)
    }
}
