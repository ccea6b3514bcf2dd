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

//! Generic store of JSON documents grouped in collections.
//!
//! All resources of a service share a single `documents` table.  Each row carries the name of
//! the collection the document belongs to, its identifier, its version and its body as a JSON
//! object.  Queries described by a `QuerySpec` are translated to SQL that inspects the body with
//! the JSON functions of each database, always passing user-provided values as bound parameters.

use crate::db::{DbResult, Executor};
use crate::model::{Document, DocumentId};
use crate::query::QuerySpec;

#[cfg(feature = "postgres")]
mod postgres;
#[cfg(any(feature = "sqlite", test))]
mod sqlite;
#[cfg(test)]
mod tests;

/// Clamps a page quantity to the range of the integers that databases accept in `LIMIT` and
/// `OFFSET` clauses.
#[cfg(any(feature = "postgres", feature = "sqlite", test))]
fn clamp_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Creates the tables needed by the document store if they do not exist yet.
pub async fn init_schema(ex: &mut Executor) -> DbResult<()> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => crate::db::postgres::run_schema(ex, postgres::SCHEMA).await,

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => crate::db::sqlite::run_schema(ex, sqlite::SCHEMA).await,

        #[allow(unreachable_patterns)]
        _ => unreachable!("No database backends enabled"),
    }
}

/// Finds the documents of `collection` that match the filter of `spec`, in the order and within
/// the page requested by `spec`.
///
/// Documents are sorted by insertion order after all sort keys of `spec`, so the results are
/// stable across calls.  The projection of `spec` is not applied here.
pub async fn find_documents(
    ex: &mut Executor,
    collection: &str,
    spec: &QuerySpec,
) -> DbResult<Vec<Document>> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => postgres::find_documents(ex.conn(), collection, spec).await,

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => sqlite::find_documents(ex.conn(), collection, spec).await,

        #[allow(unreachable_patterns)]
        _ => unreachable!("No database backends enabled"),
    }
}

/// Gets the document `id` of `collection`, if it exists.
pub async fn get_document(
    ex: &mut Executor,
    collection: &str,
    id: &DocumentId,
) -> DbResult<Option<Document>> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => postgres::get_document(ex.conn(), collection, id).await,

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => sqlite::get_document(ex.conn(), collection, id).await,

        #[allow(unreachable_patterns)]
        _ => unreachable!("No database backends enabled"),
    }
}

/// Inserts the new `doc` into `collection`.
///
/// Fails with `AlreadyExists` if the collection already has a document with the same id.
pub async fn insert_document(ex: &mut Executor, collection: &str, doc: &Document) -> DbResult<()> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => postgres::insert_document(ex.conn(), collection, doc).await,

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => sqlite::insert_document(ex.conn(), collection, doc).await,

        #[allow(unreachable_patterns)]
        _ => unreachable!("No database backends enabled"),
    }
}

/// Replaces the version and body of the existing document with the id of `doc` in `collection`.
///
/// Fails with `NotFound` if the document does not exist.
pub async fn update_document(ex: &mut Executor, collection: &str, doc: &Document) -> DbResult<()> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => postgres::update_document(ex.conn(), collection, doc).await,

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => sqlite::update_document(ex.conn(), collection, doc).await,

        #[allow(unreachable_patterns)]
        _ => unreachable!("No database backends enabled"),
    }
}

/// Deletes the document `id` of `collection`.
///
/// Fails with `NotFound` if the document does not exist.
pub async fn delete_document(ex: &mut Executor, collection: &str, id: &DocumentId) -> DbResult<()> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => postgres::delete_document(ex.conn(), collection, id).await,

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => sqlite::delete_document(ex.conn(), collection, id).await,

        #[allow(unreachable_patterns)]
        _ => unreachable!("No database backends enabled"),
    }
}

/// Test utilities for the document store.
#[cfg(any(test, feature = "testutils"))]
pub mod testutils {
    use super::*;
    use crate::db::Db;
    use crate::db::sqlite;
    use std::sync::Arc;

    /// Creates an in-memory SQLite database with the document store schema.
    pub async fn setup() -> Arc<dyn Db + Send + Sync> {
        let db = sqlite::testutils::setup().await;
        init_schema(&mut db.ex().await.unwrap()).await.unwrap();
        Arc::new(db)
    }
}
