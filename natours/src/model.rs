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

//! Data types for the tours and reviews of the service.

use derive_getters::Getters;
use natours_core::driver::resource::Resource;
use natours_core::model::{DocumentId, ModelError, ModelResult};
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

/// Minimum number of characters in a tour name.
const MIN_TOUR_NAME_LENGTH: usize = 10;

/// Maximum number of characters in a tour name.
const MAX_TOUR_NAME_LENGTH: usize = 40;

/// Lowest valid rating.
const MIN_RATING: f64 = 1.0;

/// Highest valid rating.
const MAX_RATING: f64 = 5.0;

/// Format of the start dates of tours.
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Deserializes a string and strips its surrounding whitespace.
fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let s = String::deserialize(deserializer)?;
    Ok(s.trim().to_owned())
}

/// Checks that an optional `rating` of the field `what` is within the valid range.
fn validate_rating(what: &str, rating: f64) -> ModelResult<()> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(ModelError(format!(
            "{} must be between {} and {}",
            what, MIN_RATING, MAX_RATING
        )));
    }
    Ok(())
}

/// Difficulty level of a tour.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Suitable for everyone.
    Easy,

    /// Requires some fitness.
    Medium,

    /// Only for the experienced.
    Difficult,
}

impl Difficulty {
    /// Returns the textual representation of the difficulty.
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        }
    }
}

/// A day on which a tour starts.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct StartDate(Date);

impl StartDate {
    /// Parses a start date from an untrusted `YYYY-MM-DD` string `s`.
    pub fn parse(s: &str) -> ModelResult<Self> {
        match Date::parse(s, DATE_FORMAT) {
            Ok(date) => Ok(Self(date)),
            Err(e) => Err(ModelError(format!("Invalid start date '{}': {}", s, e))),
        }
    }

    /// Returns the date.
    pub fn date(&self) -> Date {
        self.0
    }
}

impl From<Date> for StartDate {
    fn from(date: Date) -> Self {
        Self(date)
    }
}

impl fmt::Display for StartDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0.format(DATE_FORMAT).map_err(|_| fmt::Error)?;
        f.write_str(&s)
    }
}

impl Serialize for StartDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Visitor to deserialize a `StartDate` from a string.
struct StartDateVisitor;

impl Visitor<'_> for StartDateVisitor {
    type Value = StartDate;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(r#"a date in YYYY-MM-DD format"#)
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        StartDate::parse(v).map_err(|e| E::custom(e.to_string()))
    }
}

impl<'de> Deserialize<'de> for StartDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(StartDateVisitor)
    }
}

/// Default average rating of tours that have not been rated yet.
fn default_ratings_average() -> f64 {
    4.5
}

/// A tour offered by the company.
#[derive(Debug, Deserialize, Getters, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    /// Unique name of the tour.
    #[serde(deserialize_with = "trimmed")]
    name: String,

    /// Length of the tour in days.
    duration: u32,

    /// Maximum number of people per group.
    max_group_size: u32,

    /// How hard the tour is.
    difficulty: Difficulty,

    /// Average of all ratings given to the tour.
    #[serde(default = "default_ratings_average")]
    ratings_average: f64,

    /// Number of ratings given to the tour.
    #[serde(default)]
    ratings_quantity: u32,

    /// Regular price of the tour.
    price: f64,

    /// Discounted price of the tour, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    price_discount: Option<f64>,

    /// One-line description of the tour.
    #[serde(deserialize_with = "trimmed")]
    summary: String,

    /// Long description of the tour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    /// Days on which the tour starts.
    #[serde(default)]
    start_dates: Vec<StartDate>,

    /// Whether the tour is only offered to VIPs.
    #[serde(default)]
    secret_tour: bool,
}

impl Resource for Tour {
    const COLLECTION: &'static str = "tours";

    fn validate(&self) -> ModelResult<()> {
        let name_length = self.name.chars().count();
        if name_length < MIN_TOUR_NAME_LENGTH {
            return Err(ModelError(format!(
                "A tour name must have at least {} characters",
                MIN_TOUR_NAME_LENGTH
            )));
        }
        if name_length > MAX_TOUR_NAME_LENGTH {
            return Err(ModelError(format!(
                "A tour name must have at most {} characters",
                MAX_TOUR_NAME_LENGTH
            )));
        }

        if self.duration == 0 {
            return Err(ModelError("A tour must last at least one day".to_owned()));
        }
        if self.max_group_size == 0 {
            return Err(ModelError("A tour group must admit at least one person".to_owned()));
        }

        validate_rating("Rating", self.ratings_average)?;

        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ModelError("A tour price cannot be negative".to_owned()));
        }
        if let Some(discount) = self.price_discount {
            if discount < 0.0 || discount >= self.price {
                return Err(ModelError(format!(
                    "Discount price ({}) should be below regular price",
                    discount
                )));
            }
        }

        if self.summary.is_empty() {
            return Err(ModelError("A tour must have a summary".to_owned()));
        }

        Ok(())
    }
}

/// A review of a tour.
#[derive(Debug, Deserialize, Getters, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Text of the review.
    #[serde(deserialize_with = "trimmed")]
    review: String,

    /// Rating given to the tour, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rating: Option<f64>,

    /// When the review was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(with = "time::serde::rfc3339::option")]
    created_at: Option<OffsetDateTime>,

    /// The reviewed tour.
    tour: DocumentId,

    /// Author of the review.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

impl Resource for Review {
    const COLLECTION: &'static str = "reviews";

    fn validate(&self) -> ModelResult<()> {
        if self.review.is_empty() {
            return Err(ModelError("Review can not be empty!".to_owned()));
        }
        if let Some(rating) = self.rating {
            validate_rating("Rating", rating)?;
        }
        Ok(())
    }
}
