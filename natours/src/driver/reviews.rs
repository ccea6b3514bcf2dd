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

//! Persistence of reviews.

use crate::model::Review;
use async_trait::async_trait;
use log::debug;
use natours_core::clocks::Clock;
use natours_core::driver::resource::{DocumentRepository, Expansion, Repository, UpdateOptions};
use natours_core::driver::{DriverError, DriverResult};
use natours_core::model::{DocumentId, Record};
use natours_core::query::QuerySpec;
use serde_json::{Map, Value};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;

/// Name of the field that records when a review was written.
const CREATED_AT_FIELD: &str = "createdAt";

/// A `Repository` for reviews that stamps new reviews with their creation time.
pub(crate) struct ReviewRepository {
    /// The underlying document repository.
    inner: DocumentRepository<Review>,

    /// Clock to obtain the creation time of new reviews.
    clock: Arc<dyn Clock + Send + Sync>,
}

impl ReviewRepository {
    /// Creates a new repository that wraps `inner` and takes timestamps from `clock`.
    pub(crate) fn new(
        inner: DocumentRepository<Review>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self { inner, clock }
    }
}

#[async_trait]
impl Repository for ReviewRepository {
    async fn find_all(&self, spec: &QuerySpec) -> DriverResult<Vec<Record>> {
        self.inner.find_all(spec).await
    }

    async fn find_by_id(
        &self,
        id: &DocumentId,
        expand: &[Expansion],
    ) -> DriverResult<Option<Record>> {
        self.inner.find_by_id(id, expand).await
    }

    async fn create(&self, mut payload: Map<String, Value>) -> DriverResult<Record> {
        if payload.get(CREATED_AT_FIELD).is_none_or(Value::is_null) {
            let now = self
                .clock
                .now_utc()
                .format(&Rfc3339)
                .map_err(|e| DriverError::BackendError(format!("Cannot format time: {}", e)))?;
            debug!("Stamping new review with {}", now);
            payload.insert(CREATED_AT_FIELD.to_owned(), Value::String(now));
        }
        self.inner.create(payload).await
    }

    async fn update_by_id(
        &self,
        id: &DocumentId,
        patch: Map<String, Value>,
        options: UpdateOptions,
    ) -> DriverResult<Option<Record>> {
        self.inner.update_by_id(id, patch, options).await
    }

    async fn delete_by_id(&self, id: &DocumentId) -> DriverResult<Option<()>> {
        self.inner.delete_by_id(id).await
    }
}
