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

//! Generic CRUD handlers for any resource exposed through a `Repository`.
//!
//! A service mounts a resource by creating a `ResourceRoutes` for its repository and plugging the
//! method routers it hands out into its `Router`:
//!
//! ```ignore
//! let tours = ResourceRoutes::new(driver.tours()).with_expansion(reviews_of_tour);
//! Router::new()
//!     .route("/api/v1/tours", tours.collection())
//!     .route("/api/v1/tours/:id", tours.member())
//! ```

use crate::driver::resource::{Expansion, Repository, UpdateOptions};
use crate::model::{DocumentId, Record};
use crate::query::{FieldName, Literal, Predicate, QueryParams, QuerySpec, pipeline};
use crate::rest::{EmptyBody, JsonBody, RestError, RestResult, STATUS_SUCCESS};
use axum::Json;
use axum::extract::{Path, RawQuery, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, get};
use derivative::Derivative;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;

/// Message returned when a single-record operation targets a record that does not exist.
pub const NOT_FOUND_MESSAGE: &str = "No document found with that ID";

/// Payload of a successful response.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct Data<T> {
    /// The returned record or records.
    pub data: T,
}

/// Envelope of all successful responses that carry content.
#[derive(Debug, Deserialize, PartialEq, Serialize)]
pub struct SuccessResponse<T> {
    /// Always `success`.
    pub status: String,

    /// Number of returned records, only present in list responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,

    /// The payload.
    pub data: Data<T>,
}

impl<T> SuccessResponse<T> {
    /// Wraps a single record.
    pub fn one(data: T) -> Self {
        Self { status: STATUS_SUCCESS.to_owned(), results: None, data: Data { data } }
    }
}

impl<T> SuccessResponse<Vec<T>> {
    /// Wraps a list of records and reports how many there are.
    pub fn many(data: Vec<T>) -> Self {
        Self { status: STATUS_SUCCESS.to_owned(), results: Some(data.len()), data: Data { data } }
    }
}

/// Parses the textual `id` of a path into a document identifier.
///
/// Identifiers that cannot be parsed cannot match any document, so they are reported as missing.
fn parse_id(id: &str) -> RestResult<DocumentId> {
    DocumentId::from_str(id).map_err(|e| {
        debug!("Rejecting malformed id '{}': {}", id, e);
        RestError::NotFound(NOT_FOUND_MESSAGE.to_owned())
    })
}

/// Converts the absence of a record into the error returned to the client.
fn found<T>(maybe: Option<T>) -> RestResult<T> {
    maybe.ok_or_else(|| RestError::NotFound(NOT_FOUND_MESSAGE.to_owned()))
}

/// Runs the query pipeline for `params` on top of `scope` and returns the matching records of
/// `repository` as a list response.
///
/// This is the body of the list handler, exposed so that services can build alias routes that
/// preset some of the parameters.
pub async fn list_records<R: Repository>(
    repository: &R,
    scope: QuerySpec,
    params: &QueryParams,
) -> RestResult<Response> {
    let spec = pipeline(scope, params)?;
    let records = repository.find_all(&spec).await?;
    Ok(Json(SuccessResponse::many(records)).into_response())
}

/// Validates `payload` and stores it as a new record of `repository`.
async fn create_record<R: Repository>(
    repository: &R,
    payload: Map<String, Value>,
) -> RestResult<Response> {
    let record = repository.create(payload).await?;
    Ok((http::StatusCode::CREATED, Json(SuccessResponse::one(record))).into_response())
}

/// Factory of the list, get-one, create, update and delete handlers of a resource.
#[derive(Derivative)]
#[derivative(Clone(bound = ""))]
pub struct ResourceRoutes<R: Repository> {
    /// Persistence for the records of the resource.
    repository: Arc<R>,

    /// Relations to attach to the records returned by the get-one handler.
    expand: Arc<Vec<Expansion>>,
}

impl<R: Repository> ResourceRoutes<R> {
    /// Creates the handlers for the resource persisted by `repository`.
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository, expand: Arc::new(vec![]) }
    }

    /// Makes the get-one handler attach the related documents described by `expansion`.
    pub fn with_expansion(mut self, expansion: Expansion) -> Self {
        Arc::make_mut(&mut self.expand).push(expansion);
        self
    }

    /// Returns the repository behind these handlers.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Returns the handlers for the collection path of the resource: list and create.
    pub fn collection<S>(&self) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        get(list::<R>).post(create::<R>).with_state(self.clone())
    }

    /// Returns the handlers for the path of a single record, which must capture the record id as
    /// its only parameter: get-one, update and delete.
    pub fn member<S>(&self) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        get(get_one::<R>).patch(update::<R>).delete(delete::<R>).with_state(self.clone())
    }

    /// Returns the list and create handlers for a path nested under a parent record, which must
    /// capture the parent id as its only parameter.
    ///
    /// Listing only returns the records whose top-level `parent_field` holds the parent id, and
    /// creating stores the parent id in `parent_field` of the new record.
    pub fn scoped_collection<S>(&self, parent_field: &'static str) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let scoped = Scoped { routes: self.clone(), parent_field: FieldName::from(parent_field) };
        get(scoped_list::<R>).post(scoped_create::<R>).with_state(scoped)
    }
}

/// State of the handlers nested under a parent record.
#[derive(Derivative)]
#[derivative(Clone(bound = ""))]
struct Scoped<R: Repository> {
    /// The handlers of the nested resource.
    routes: ResourceRoutes<R>,

    /// Field of the nested records that references the parent.
    parent_field: FieldName,
}

/// List handler.
async fn list<R: Repository>(
    State(routes): State<ResourceRoutes<R>>,
    RawQuery(query): RawQuery,
    _: EmptyBody,
) -> RestResult<Response> {
    let params = QueryParams::parse(query.as_deref())?;
    list_records(routes.repository(), QuerySpec::default(), &params).await
}

/// Get-one handler.
async fn get_one<R: Repository>(
    State(routes): State<ResourceRoutes<R>>,
    Path(id): Path<String>,
    _: EmptyBody,
) -> RestResult<Response> {
    let id = parse_id(&id)?;
    let record = found(routes.repository.find_by_id(&id, &routes.expand).await?)?;
    Ok(Json(SuccessResponse::one(record)).into_response())
}

/// Create handler.
async fn create<R: Repository>(
    State(routes): State<ResourceRoutes<R>>,
    JsonBody(payload): JsonBody<Map<String, Value>>,
) -> RestResult<Response> {
    create_record(routes.repository(), payload).await
}

/// Update handler.
async fn update<R: Repository>(
    State(routes): State<ResourceRoutes<R>>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<Map<String, Value>>,
) -> RestResult<Response> {
    let id = parse_id(&id)?;
    let options = UpdateOptions { return_updated: true, validate: true };
    let record: Record = found(routes.repository.update_by_id(&id, patch, options).await?)?;
    Ok(Json(SuccessResponse::one(record)).into_response())
}

/// Delete handler.
async fn delete<R: Repository>(
    State(routes): State<ResourceRoutes<R>>,
    Path(id): Path<String>,
    _: EmptyBody,
) -> RestResult<Response> {
    let id = parse_id(&id)?;
    found(routes.repository.delete_by_id(&id).await?)?;
    Ok(http::StatusCode::NO_CONTENT.into_response())
}

/// List handler for records nested under a parent.
async fn scoped_list<R: Repository>(
    State(scoped): State<Scoped<R>>,
    Path(parent_id): Path<String>,
    RawQuery(query): RawQuery,
    _: EmptyBody,
) -> RestResult<Response> {
    let params = QueryParams::parse(query.as_deref())?;
    let scope = QuerySpec::default()
        .with_predicate(Predicate::eq(scoped.parent_field.clone(), Literal::Text(parent_id)));
    list_records(scoped.routes.repository(), scope, &params).await
}

/// Create handler for records nested under a parent.
async fn scoped_create<R: Repository>(
    State(scoped): State<Scoped<R>>,
    Path(parent_id): Path<String>,
    JsonBody(mut payload): JsonBody<Map<String, Value>>,
) -> RestResult<Response> {
    payload.insert(scoped.parent_field.as_str().to_owned(), Value::String(parent_id));
    create_record(scoped.routes.repository(), payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;
    use crate::db::documents::testutils::setup;
    use crate::driver::resource::{DocumentRepository, Resource};
    use crate::model::{ModelError, ModelResult};
    use crate::rest::testutils::*;
    use axum::Router;
    use axum::http;
    use serde_json::json;

    /// A priced resource to exercise the list handler.
    #[derive(Deserialize, Serialize)]
    struct Item {
        name: String,
        price: f64,

        #[serde(default)]
        stock: u32,
    }

    impl Resource for Item {
        const COLLECTION: &'static str = "items";

        fn validate(&self) -> ModelResult<()> {
            if self.price < 0.0 {
                return Err(ModelError("Item price cannot be negative".to_owned()));
            }
            Ok(())
        }
    }

    /// A resource nested under `Item` through its `item` field.
    #[derive(Deserialize, Serialize)]
    struct Note {
        text: String,
        item: String,
    }

    impl Resource for Note {
        const COLLECTION: &'static str = "notes";
    }

    struct TestContext {
        db: Arc<dyn Db + Send + Sync>,
        app: Router,
    }

    impl TestContext {
        async fn setup() -> Self {
            let db = setup().await;
            let items = ResourceRoutes::new(Arc::new(DocumentRepository::<Item>::new(db.clone())))
                .with_expansion(Expansion::new("notes", Note::COLLECTION, "item"));
            let notes = ResourceRoutes::new(Arc::new(DocumentRepository::<Note>::new(db.clone())));
            let app = Router::new()
                .route("/items", items.collection())
                .route("/items/:id", items.member())
                .route("/items/:id/notes", notes.scoped_collection("item"))
                .route("/notes", notes.collection());
            Self { db, app }
        }

        fn app(&self) -> Router {
            self.app.clone()
        }

        fn into_app(self) -> Router {
            self.app
        }

        async fn create_item(&self, name: &str, price: f64) -> String {
            let repo = DocumentRepository::<Item>::new(self.db.clone());
            let payload = json!({"name": name, "price": price});
            let record = repo.create(payload.as_object().unwrap().clone()).await.unwrap();
            record.get("id").unwrap().as_str().unwrap().to_owned()
        }

        async fn count_items(&self) -> usize {
            let repo = DocumentRepository::<Item>::new(self.db.clone());
            repo.find_all(&QuerySpec::default()).await.unwrap().len()
        }
    }

    fn names(response: &SuccessResponse<Vec<Record>>) -> Vec<&str> {
        response.data.data.iter().map(|r| r.get("name").unwrap().as_str().unwrap()).collect()
    }

    fn missing_id() -> String {
        DocumentId::new_random().to_string()
    }

    #[tokio::test]
    async fn test_list_empty() {
        let context = TestContext::setup().await;

        let response = OneShotBuilder::new(context.app(), (http::Method::GET, "/items"))
            .send_empty()
            .await
            .expect_json::<SuccessResponse<Vec<Record>>>()
            .await;
        assert_eq!(SuccessResponse::many(vec![]), response);
    }

    #[tokio::test]
    async fn test_list_sort_and_paginate() {
        let context = TestContext::setup().await;
        for (name, price) in [("a", 10.0), ("b", 50.0), ("c", 30.0), ("d", 40.0), ("e", 20.0)] {
            context.create_item(name, price).await;
        }

        let response = OneShotBuilder::new(context.app(), (http::Method::GET, "/items"))
            .with_query([("sort", "-price"), ("limit", "2"), ("page", "1")])
            .send_empty()
            .await
            .expect_json::<SuccessResponse<Vec<Record>>>()
            .await;
        assert_eq!("success", response.status);
        assert_eq!(Some(2), response.results);
        assert_eq!(vec!["b", "d"], names(&response));

        let response = OneShotBuilder::new(context.app(), (http::Method::GET, "/items"))
            .with_query([("sort", "-price"), ("limit", "2"), ("page", "3")])
            .send_empty()
            .await
            .expect_json::<SuccessResponse<Vec<Record>>>()
            .await;
        assert_eq!(vec!["a"], names(&response));
    }

    #[tokio::test]
    async fn test_list_filter_and_fields() {
        let context = TestContext::setup().await;
        context.create_item("cheap", 99.0).await;
        context.create_item("exact", 100.0).await;
        context.create_item("pricey", 150.0).await;

        let response = OneShotBuilder::new(context.app(), (http::Method::GET, "/items"))
            .with_raw_query("price[gte]=100&fields=name,price&sort=price")
            .send_empty()
            .await
            .expect_json::<SuccessResponse<Vec<Record>>>()
            .await;
        assert_eq!(vec!["exact", "pricey"], names(&response));
        for record in &response.data.data {
            let mut keys = record.keys().collect::<Vec<&str>>();
            keys.sort();
            assert_eq!(vec!["id", "name", "price"], keys);
        }
    }

    #[tokio::test]
    async fn test_list_default_projection_hides_version() {
        let context = TestContext::setup().await;
        context.create_item("thing", 1.0).await;

        let response = OneShotBuilder::new(context.app(), (http::Method::GET, "/items"))
            .send_empty()
            .await
            .expect_json::<SuccessResponse<Vec<Record>>>()
            .await;
        assert_eq!(1, response.data.data.len());
        assert!(response.data.data[0].get("__v").is_none());
        assert_eq!(Some(&json!(0)), response.data.data[0].get("stock"));
    }

    #[tokio::test]
    async fn test_list_bad_operator() {
        let context = TestContext::setup().await;

        OneShotBuilder::new(context.into_app(), (http::Method::GET, "/items"))
            .with_raw_query("price[ne]=3")
            .send_empty()
            .await
            .expect_status(http::StatusCode::BAD_REQUEST)
            .expect_error("Unsupported operator 'ne'")
            .await;
    }

    #[tokio::test]
    async fn test_list_filter_number_like_text() {
        let context = TestContext::setup().await;
        context.create_item("123", 5.0).await;
        context.create_item("abc", 5.0).await;
        context.create_item("other", 123.0).await;

        let response = OneShotBuilder::new(context.app(), (http::Method::GET, "/items"))
            .with_raw_query("name=123")
            .send_empty()
            .await
            .expect_json::<SuccessResponse<Vec<Record>>>()
            .await;
        assert_eq!(Some(1), response.results);
        assert_eq!(vec!["123"], names(&response));

        let response = OneShotBuilder::new(context.app(), (http::Method::GET, "/items"))
            .with_raw_query("price=123")
            .send_empty()
            .await
            .expect_json::<SuccessResponse<Vec<Record>>>()
            .await;
        assert_eq!(vec!["other"], names(&response));
    }

    #[tokio::test]
    async fn test_list_range_with_text_value() {
        let context = TestContext::setup().await;
        context.create_item("a", 10.0).await;
        context.create_item("b", 20.0).await;

        OneShotBuilder::new(context.into_app(), (http::Method::GET, "/items"))
            .with_raw_query("price[gte]=abc")
            .send_empty()
            .await
            .expect_status(http::StatusCode::BAD_REQUEST)
            .expect_error("Invalid value for price\\[gte\\]: expected a number")
            .await;
    }

    #[tokio::test]
    async fn test_get_one_ok_with_expansion() {
        let context = TestContext::setup().await;
        let id = context.create_item("thing", 1.0).await;

        OneShotBuilder::new(context.app(), (http::Method::POST, format!("/items/{}/notes", id)))
            .send_json(json!({"text": "nice"}))
            .await
            .expect_status(http::StatusCode::CREATED)
            .expect_json::<SuccessResponse<Record>>()
            .await;

        let response =
            OneShotBuilder::new(context.app(), (http::Method::GET, format!("/items/{}", id)))
                .send_empty()
                .await
                .expect_json::<SuccessResponse<Record>>()
                .await;
        assert_eq!(None, response.results);
        let record = response.data.data;
        assert_eq!(Some(&json!(id)), record.get("id"));
        assert_eq!(Some(&json!("thing")), record.get("name"));
        let notes = record.get("notes").unwrap().as_array().unwrap();
        assert_eq!(1, notes.len());
        assert_eq!(json!("nice"), notes[0]["text"]);
        assert_eq!(json!(id), notes[0]["item"]);
    }

    #[tokio::test]
    async fn test_get_one_missing() {
        let context = TestContext::setup().await;
        context.create_item("thing", 1.0).await;

        OneShotBuilder::new(context.app(), (http::Method::GET, format!("/items/{}", missing_id())))
            .send_empty()
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error(NOT_FOUND_MESSAGE)
            .await;

        OneShotBuilder::new(context.into_app(), (http::Method::GET, "/items/not-an-id"))
            .send_empty()
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error(NOT_FOUND_MESSAGE)
            .await;
    }

    #[tokio::test]
    async fn test_create_ok() {
        let context = TestContext::setup().await;

        let response = OneShotBuilder::new(context.app(), (http::Method::POST, "/items"))
            .send_json(json!({"name": "thing", "price": 12.5}))
            .await
            .expect_status(http::StatusCode::CREATED)
            .expect_json::<SuccessResponse<Record>>()
            .await;
        assert_eq!("success", response.status);
        assert_eq!(Some(&json!("thing")), response.data.data.get("name"));
        assert_eq!(Some(&json!(12.5)), response.data.data.get("price"));
        assert_eq!(1, context.count_items().await);
    }

    #[tokio::test]
    async fn test_create_missing_field() {
        let context = TestContext::setup().await;

        OneShotBuilder::new(context.app(), (http::Method::POST, "/items"))
            .send_json(json!({"name": "thing"}))
            .await
            .expect_status(http::StatusCode::BAD_REQUEST)
            .expect_error("Invalid items data: missing field `price`")
            .await;
        assert_eq!(0, context.count_items().await);
    }

    #[tokio::test]
    async fn test_create_invalid() {
        let context = TestContext::setup().await;

        OneShotBuilder::new(context.app(), (http::Method::POST, "/items"))
            .send_json(json!({"name": "thing", "price": -1}))
            .await
            .expect_status(http::StatusCode::BAD_REQUEST)
            .expect_error("cannot be negative")
            .await;
        assert_eq!(0, context.count_items().await);
    }

    #[tokio::test]
    async fn test_update_ok() {
        let context = TestContext::setup().await;
        let id = context.create_item("thing", 1.0).await;

        let response =
            OneShotBuilder::new(context.app(), (http::Method::PATCH, format!("/items/{}", id)))
                .send_json(json!({"price": 2.0, "stock": 7}))
                .await
                .expect_json::<SuccessResponse<Record>>()
                .await;
        let record = response.data.data;
        assert_eq!(Some(&json!("thing")), record.get("name"));
        assert_eq!(Some(&json!(2.0)), record.get("price"));
        assert_eq!(Some(&json!(7)), record.get("stock"));
        assert_eq!(Some(&json!(1)), record.get("__v"));
    }

    #[tokio::test]
    async fn test_update_invalid() {
        let context = TestContext::setup().await;
        let id = context.create_item("thing", 1.0).await;

        OneShotBuilder::new(context.app(), (http::Method::PATCH, format!("/items/{}", id)))
            .send_json(json!({"price": -5}))
            .await
            .expect_status(http::StatusCode::BAD_REQUEST)
            .expect_error("cannot be negative")
            .await;
    }

    #[tokio::test]
    async fn test_update_missing() {
        let context = TestContext::setup().await;

        let route = (http::Method::PATCH, format!("/items/{}", missing_id()));
        OneShotBuilder::new(context.into_app(), route)
            .send_json(json!({"price": 2.0}))
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error(NOT_FOUND_MESSAGE)
            .await;
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let context = TestContext::setup().await;
        let id = context.create_item("thing", 1.0).await;

        OneShotBuilder::new(context.app(), (http::Method::DELETE, format!("/items/{}", id)))
            .send_empty()
            .await
            .expect_status(http::StatusCode::NO_CONTENT)
            .expect_empty()
            .await;
        assert_eq!(0, context.count_items().await);

        OneShotBuilder::new(context.app(), (http::Method::DELETE, format!("/items/{}", id)))
            .send_empty()
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error(NOT_FOUND_MESSAGE)
            .await;
    }

    #[tokio::test]
    async fn test_scoped_list() {
        let context = TestContext::setup().await;
        let first = context.create_item("first", 1.0).await;
        let second = context.create_item("second", 2.0).await;

        for (item, text) in [(&first, "one"), (&second, "two"), (&first, "three")] {
            OneShotBuilder::new(
                context.app(),
                (http::Method::POST, format!("/items/{}/notes", item)),
            )
            .send_json(json!({"text": text, "item": "overridden"}))
            .await
            .expect_status(http::StatusCode::CREATED)
            .expect_json::<SuccessResponse<Record>>()
            .await;
        }

        let response = OneShotBuilder::new(
            context.app(),
            (http::Method::GET, format!("/items/{}/notes", first)),
        )
        .send_empty()
        .await
        .expect_json::<SuccessResponse<Vec<Record>>>()
        .await;
        assert_eq!(Some(2), response.results);
        let texts = response
            .data
            .data
            .iter()
            .map(|r| r.get("text").unwrap().as_str().unwrap())
            .collect::<Vec<&str>>();
        assert_eq!(vec!["one", "three"], texts);

        let response = OneShotBuilder::new(context.app(), (http::Method::GET, "/notes"))
            .send_empty()
            .await
            .expect_json::<SuccessResponse<Vec<Record>>>()
            .await;
        assert_eq!(Some(3), response.results);
    }

    fn list_route() -> (http::Method, &'static str) {
        (http::Method::GET, "/items")
    }

    fn create_route() -> (http::Method, &'static str) {
        (http::Method::POST, "/items")
    }

    test_payload_must_be_empty!(TestContext::setup().await.into_app(), list_route());

    test_payload_must_be_json!(TestContext::setup().await.into_app(), create_route());
}
