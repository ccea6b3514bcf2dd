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

//! Business logic for the service.

use crate::model::{Review, Tour};
use natours_core::clocks::Clock;
use natours_core::db::Db;
use natours_core::driver::resource::DocumentRepository;
use std::sync::Arc;

mod reviews;
pub(crate) use reviews::ReviewRepository;
mod stats;
pub(crate) use stats::{DifficultyStats, MonthlyPlan};
#[cfg(test)]
pub(crate) mod testutils;

/// Business logic.
///
/// The driver hands out one repository per resource.  The repositories are shared by all
/// requests and every one of their operations runs against its own database executor.
#[derive(Clone)]
pub(crate) struct Driver {
    /// Persistence for tours.
    tours: Arc<DocumentRepository<Tour>>,

    /// Persistence for reviews.
    reviews: Arc<ReviewRepository>,
}

impl Driver {
    /// Creates a new driver backed by the given injected components.
    pub(crate) fn new(db: Arc<dyn Db + Send + Sync>, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let tours = Arc::from(DocumentRepository::<Tour>::new(db.clone()));
        let reviews = DocumentRepository::<Review>::new(db);
        let reviews = Arc::from(ReviewRepository::new(reviews, clock));
        Self { tours, reviews }
    }

    /// Returns the repository of tours.
    pub(crate) fn tours(&self) -> Arc<DocumentRepository<Tour>> {
        self.tours.clone()
    }

    /// Returns the repository of reviews.
    pub(crate) fn reviews(&self) -> Arc<ReviewRepository> {
        self.reviews.clone()
    }
}
