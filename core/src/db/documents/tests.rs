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

//! Document store tests shared by all implementations.

use crate::db::documents::*;
use crate::db::{Db, DbError};
use crate::model::{Document, DocumentId, Version};
use crate::query::{
    ComparisonOp, FieldName, Literal, Page, Predicate, QuerySpec, SortDirection, SortKey,
};
use serde_json::{Value, json};
use std::sync::Arc;

/// Creates a new document with version 0 and the given JSON object as its `body`.
fn new_doc(body: Value) -> Document {
    let body = body.as_object().expect("Test bodies must be objects").clone();
    Document::new(DocumentId::new_random(), Version::initial(), body)
}

/// Inserts one document per body into `collection` and returns them in insertion order.
async fn insert_all(
    db: &Arc<dyn Db + Send + Sync>,
    collection: &str,
    bodies: Vec<Value>,
) -> Vec<Document> {
    let mut docs = vec![];
    for body in bodies {
        let doc = new_doc(body);
        insert_document(&mut db.ex().await.unwrap(), collection, &doc).await.unwrap();
        docs.push(doc);
    }
    docs
}

/// Runs `spec` over `collection` and returns the `name` field of every matching document.
async fn find_names(
    db: &Arc<dyn Db + Send + Sync>,
    collection: &str,
    spec: &QuerySpec,
) -> Vec<String> {
    find_documents(&mut db.ex().await.unwrap(), collection, spec)
        .await
        .unwrap()
        .into_iter()
        .map(|doc| doc.body()["name"].as_str().unwrap().to_owned())
        .collect()
}

/// Inserts a collection of tours used by the query tests.
async fn insert_tours(db: &Arc<dyn Db + Send + Sync>) -> Vec<Document> {
    insert_all(
        db,
        "tours",
        vec![
            json!({"name": "forest", "price": 397, "difficulty": "easy", "secret": false,
                   "location": {"country": "CA"}}),
            json!({"name": "sea", "price": 497, "difficulty": "medium", "secret": false,
                   "location": {"country": "US"}}),
            json!({"name": "snow", "price": 997, "difficulty": "difficult", "secret": true,
                   "location": {"country": "US"}}),
            json!({"name": "city", "price": 1197, "difficulty": "easy", "secret": false}),
            json!({"name": "park", "price": 397.5, "difficulty": "medium", "secret": false}),
        ],
    )
    .await
}

pub(super) async fn test_insert_and_get(db: Arc<dyn Db + Send + Sync>) {
    let doc = new_doc(json!({"name": "forest", "nested": {"a": [1, 2]}}));
    insert_document(&mut db.ex().await.unwrap(), "tours", &doc).await.unwrap();

    let found = get_document(&mut db.ex().await.unwrap(), "tours", doc.id()).await.unwrap();
    assert_eq!(Some(doc.clone()), found);

    let other = get_document(&mut db.ex().await.unwrap(), "reviews", doc.id()).await.unwrap();
    assert_eq!(None, other);

    db.close().await;
}

pub(super) async fn test_get_missing(db: Arc<dyn Db + Send + Sync>) {
    let found =
        get_document(&mut db.ex().await.unwrap(), "tours", &DocumentId::new_random()).await;
    assert_eq!(Ok(None), found);
    db.close().await;
}

pub(super) async fn test_insert_duplicate(db: Arc<dyn Db + Send + Sync>) {
    let doc = new_doc(json!({"name": "forest"}));
    insert_document(&mut db.ex().await.unwrap(), "tours", &doc).await.unwrap();
    assert_eq!(
        DbError::AlreadyExists,
        insert_document(&mut db.ex().await.unwrap(), "tours", &doc).await.unwrap_err()
    );

    // The same id can live in a different collection.
    insert_document(&mut db.ex().await.unwrap(), "reviews", &doc).await.unwrap();

    db.close().await;
}

pub(super) async fn test_update(db: Arc<dyn Db + Send + Sync>) {
    let doc = new_doc(json!({"name": "forest", "price": 1}));
    insert_document(&mut db.ex().await.unwrap(), "tours", &doc).await.unwrap();

    let body = json!({"name": "forest", "price": 2}).as_object().unwrap().clone();
    let updated = Document::new(*doc.id(), doc.version().next(), body);
    update_document(&mut db.ex().await.unwrap(), "tours", &updated).await.unwrap();

    let found = get_document(&mut db.ex().await.unwrap(), "tours", doc.id()).await.unwrap();
    assert_eq!(Some(updated), found);

    db.close().await;
}

pub(super) async fn test_update_missing(db: Arc<dyn Db + Send + Sync>) {
    let doc = new_doc(json!({"name": "forest"}));
    assert_eq!(
        DbError::NotFound,
        update_document(&mut db.ex().await.unwrap(), "tours", &doc).await.unwrap_err()
    );
    db.close().await;
}

pub(super) async fn test_delete(db: Arc<dyn Db + Send + Sync>) {
    let docs = insert_all(&db, "tours", vec![json!({"name": "a"}), json!({"name": "b"})]).await;

    delete_document(&mut db.ex().await.unwrap(), "tours", docs[0].id()).await.unwrap();
    assert_eq!(
        DbError::NotFound,
        delete_document(&mut db.ex().await.unwrap(), "tours", docs[0].id()).await.unwrap_err()
    );

    assert_eq!(vec!["b"], find_names(&db, "tours", &QuerySpec::default()).await);

    db.close().await;
}

pub(super) async fn test_find_insertion_order_and_collections(db: Arc<dyn Db + Send + Sync>) {
    insert_tours(&db).await;
    insert_all(&db, "reviews", vec![json!({"name": "review"})]).await;

    assert_eq!(
        vec!["forest", "sea", "snow", "city", "park"],
        find_names(&db, "tours", &QuerySpec::default()).await
    );
    assert_eq!(vec!["review"], find_names(&db, "reviews", &QuerySpec::default()).await);
    assert!(find_names(&db, "users", &QuerySpec::default()).await.is_empty());

    db.close().await;
}

pub(super) async fn test_find_equality(db: Arc<dyn Db + Send + Sync>) {
    insert_tours(&db).await;

    let spec = QuerySpec::default().with_predicate(Predicate::eq("difficulty".into(), "easy"));
    assert_eq!(vec!["forest", "city"], find_names(&db, "tours", &spec).await);

    let spec = QuerySpec::default()
        .with_predicate(Predicate::eq("difficulty".into(), "easy"))
        .with_predicate(Predicate::eq("price".into(), 397i64));
    assert_eq!(vec!["forest"], find_names(&db, "tours", &spec).await);

    let spec =
        QuerySpec::default().with_predicate(Predicate::eq("secret".into(), Literal::Bool(true)));
    assert_eq!(vec!["snow"], find_names(&db, "tours", &spec).await);

    let spec = QuerySpec::default().with_predicate(Predicate::eq("unknown".into(), "x"));
    assert!(find_names(&db, "tours", &spec).await.is_empty());

    db.close().await;
}

pub(super) async fn test_find_comparisons(db: Arc<dyn Db + Send + Sync>) {
    insert_tours(&db).await;

    let compare = |op, value| Predicate::Compare { field: FieldName::from("price"), op, value };

    let spec =
        QuerySpec::default().with_predicate(compare(ComparisonOp::Gte, Literal::Integer(497)));
    assert_eq!(vec!["sea", "snow", "city"], find_names(&db, "tours", &spec).await);

    let spec =
        QuerySpec::default().with_predicate(compare(ComparisonOp::Gt, Literal::Integer(497)));
    assert_eq!(vec!["snow", "city"], find_names(&db, "tours", &spec).await);

    let spec = QuerySpec::default()
        .with_predicate(compare(ComparisonOp::Gt, Literal::Integer(397)))
        .with_predicate(compare(ComparisonOp::Lte, Literal::Float(497.0)));
    assert_eq!(vec!["sea", "park"], find_names(&db, "tours", &spec).await);

    let spec =
        QuerySpec::default().with_predicate(compare(ComparisonOp::Lt, Literal::Float(397.5)));
    assert_eq!(vec!["forest"], find_names(&db, "tours", &spec).await);

    db.close().await;
}

pub(super) async fn test_find_any_of(db: Arc<dyn Db + Send + Sync>) {
    insert_tours(&db).await;

    let spec = QuerySpec::default().with_predicate(Predicate::AnyOf {
        field: "difficulty".into(),
        values: vec![Literal::from("medium"), Literal::from("difficult")],
    });
    assert_eq!(vec!["sea", "snow", "park"], find_names(&db, "tours", &spec).await);

    let spec = QuerySpec::default()
        .with_predicate(Predicate::AnyOf { field: "difficulty".into(), values: vec![] });
    assert!(find_names(&db, "tours", &spec).await.is_empty());

    db.close().await;
}

pub(super) async fn test_find_any_of_mixed_types(db: Arc<dyn Db + Send + Sync>) {
    insert_all(
        &db,
        "items",
        vec![
            json!({"name": "text", "code": "123"}),
            json!({"name": "number", "code": 123}),
            json!({"name": "other", "code": "abc"}),
            json!({"name": "flag", "code": true}),
        ],
    )
    .await;

    let spec = QuerySpec::default().with_predicate(Predicate::AnyOf {
        field: "code".into(),
        values: vec![Literal::Integer(123), Literal::from("123")],
    });
    assert_eq!(vec!["text", "number"], find_names(&db, "items", &spec).await);

    let spec = QuerySpec::default().with_predicate(Predicate::AnyOf {
        field: "code".into(),
        values: vec![Literal::Bool(true), Literal::from("true")],
    });
    assert_eq!(vec!["flag"], find_names(&db, "items", &spec).await);

    db.close().await;
}

pub(super) async fn test_find_nested_and_id(db: Arc<dyn Db + Send + Sync>) {
    let docs = insert_tours(&db).await;

    let spec =
        QuerySpec::default().with_predicate(Predicate::eq("location.country".into(), "US"));
    assert_eq!(vec!["sea", "snow"], find_names(&db, "tours", &spec).await);

    let spec = QuerySpec::default()
        .with_predicate(Predicate::eq("id".into(), docs[3].id().to_string().as_str()));
    assert_eq!(vec!["city"], find_names(&db, "tours", &spec).await);

    let spec = QuerySpec::default().with_predicate(Predicate::eq("__v".into(), 0i64));
    assert_eq!(5, find_names(&db, "tours", &spec).await.len());

    db.close().await;
}

pub(super) async fn test_find_sort(db: Arc<dyn Db + Send + Sync>) {
    insert_tours(&db).await;

    let spec = QuerySpec::default().with_sort_key(SortKey {
        field: "price".into(),
        direction: SortDirection::Descending,
    });
    assert_eq!(
        vec!["city", "snow", "sea", "park", "forest"],
        find_names(&db, "tours", &spec).await
    );

    let spec = QuerySpec::default()
        .with_sort_key(SortKey { field: "difficulty".into(), direction: SortDirection::Ascending })
        .with_sort_key(SortKey { field: "price".into(), direction: SortDirection::Descending });
    assert_eq!(
        vec!["snow", "city", "forest", "sea", "park"],
        find_names(&db, "tours", &spec).await
    );

    // Ties are broken by insertion order.
    let spec = QuerySpec::default()
        .with_sort_key(SortKey { field: "secret".into(), direction: SortDirection::Ascending });
    assert_eq!(
        vec!["forest", "sea", "city", "park", "snow"],
        find_names(&db, "tours", &spec).await
    );

    db.close().await;
}

pub(super) async fn test_find_page(db: Arc<dyn Db + Send + Sync>) {
    insert_tours(&db).await;

    let by_price = SortKey { field: "price".into(), direction: SortDirection::Descending };

    let spec = QuerySpec::default()
        .with_sort_key(by_price.clone())
        .with_page(Page { skip: 0, limit: 2 });
    assert_eq!(vec!["city", "snow"], find_names(&db, "tours", &spec).await);

    let spec = QuerySpec::default()
        .with_sort_key(by_price.clone())
        .with_page(Page { skip: 2, limit: 2 });
    assert_eq!(vec!["sea", "park"], find_names(&db, "tours", &spec).await);

    let spec = QuerySpec::default().with_sort_key(by_price).with_page(Page { skip: 4, limit: 2 });
    assert_eq!(vec!["forest"], find_names(&db, "tours", &spec).await);

    let spec = QuerySpec::default().with_page(Page { skip: 10, limit: 2 });
    assert!(find_names(&db, "tours", &spec).await.is_empty());

    let spec = QuerySpec::default().with_page(Page { skip: u64::MAX, limit: u64::MAX });
    assert!(find_names(&db, "tours", &spec).await.is_empty());

    db.close().await;
}

/// Instantiates the document store tests for the database returned by `setup`.
macro_rules! generate_documents_tests [
    ( $setup:expr $(, #[$extra:meta])? ) => {
        $crate::db::testutils::generate_tests!(
            $( #[$extra], )?
            $setup,
            $crate::db::documents::tests,
            test_insert_and_get,
            test_get_missing,
            test_insert_duplicate,
            test_update,
            test_update_missing,
            test_delete,
            test_find_insertion_order_and_collections,
            test_find_equality,
            test_find_comparisons,
            test_find_any_of,
            test_find_any_of_mixed_types,
            test_find_nested_and_id,
            test_find_sort,
            test_find_page
        );
    }
];

pub(super) use generate_documents_tests;
