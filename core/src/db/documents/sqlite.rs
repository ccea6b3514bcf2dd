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

//! Implementation of the document store using SQLite.

use crate::db::documents::clamp_i64;
use crate::db::sqlite::map_sqlx_error;
use crate::db::{DbError, DbResult};
use crate::model::{Document, DocumentId, ID_FIELD, VERSION_FIELD, Version};
use crate::query::{FieldName, Literal, Predicate, QuerySpec, SortDirection};
use log::debug;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::str::FromStr;

/// Schema to use to initialize the database.
pub(super) const SCHEMA: &str = include_str!("sqlite.sql");

/// Appends the SQL expression that yields the value of `field` to `qb`.
fn push_field(qb: &mut QueryBuilder<'_, Sqlite>, field: &FieldName) {
    match field.as_str() {
        ID_FIELD => {
            qb.push("id");
        }
        VERSION_FIELD => {
            qb.push("version");
        }
        _ => {
            qb.push("json_extract(body, ");
            qb.push_bind(field.json_path());
            qb.push(")");
        }
    }
}

/// Appends `value` to `qb` as a bound parameter of the matching SQL type.
fn push_literal(qb: &mut QueryBuilder<'_, Sqlite>, value: &Literal) {
    match value {
        Literal::Bool(b) => qb.push_bind(*b),
        Literal::Integer(i) => qb.push_bind(*i),
        Literal::Float(f) => qb.push_bind(*f),
        Literal::Text(s) => qb.push_bind(s.clone()),
    };
}

/// Converts a row with the `id`, `version` and `body` columns into a document.
fn parse_row(row: &SqliteRow) -> DbResult<Document> {
    let id: String = row.try_get("id").map_err(map_sqlx_error)?;
    let version: i64 = row.try_get("version").map_err(map_sqlx_error)?;
    let body: String = row.try_get("body").map_err(map_sqlx_error)?;

    let body = serde_json::from_str::<Map<String, Value>>(&body)?;
    Ok(Document::new(DocumentId::from_str(&id)?, Version::from_i64(version)?, body))
}

pub(super) async fn find_documents(
    conn: &mut SqliteConnection,
    collection: &str,
    spec: &QuerySpec,
) -> DbResult<Vec<Document>> {
    let mut qb = QueryBuilder::new("SELECT id, version, body FROM documents WHERE collection = ");
    qb.push_bind(collection.to_owned());

    for predicate in spec.filter() {
        qb.push(" AND ");
        match predicate {
            Predicate::Compare { field, op, value } => {
                push_field(&mut qb, field);
                qb.push(format!(" {} ", op.sql()));
                push_literal(&mut qb, value);
            }

            Predicate::AnyOf { field, values } if values.is_empty() => {
                debug!("Empty value list for {}; nothing can match", field);
                qb.push("1 = 0");
            }

            Predicate::AnyOf { field, values } => {
                push_field(&mut qb, field);
                qb.push(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        qb.push(", ");
                    }
                    push_literal(&mut qb, value);
                }
                qb.push(")");
            }
        }
    }

    qb.push(" ORDER BY ");
    for key in spec.sort() {
        push_field(&mut qb, &key.field);
        match key.direction {
            SortDirection::Ascending => qb.push(" ASC, "),
            SortDirection::Descending => qb.push(" DESC, "),
        };
    }
    qb.push("seq ASC");

    if let Some(page) = spec.page() {
        qb.push(" LIMIT ");
        qb.push_bind(clamp_i64(page.limit));
        qb.push(" OFFSET ");
        qb.push_bind(clamp_i64(page.skip));
    }

    debug!("Running document query: {}", qb.sql());
    let rows = qb.build().fetch_all(&mut *conn).await.map_err(map_sqlx_error)?;
    rows.iter().map(parse_row).collect()
}

pub(super) async fn get_document(
    conn: &mut SqliteConnection,
    collection: &str,
    id: &DocumentId,
) -> DbResult<Option<Document>> {
    let query_str = "SELECT id, version, body FROM documents WHERE collection = ? AND id = ?";
    let maybe_row = sqlx::query(query_str)
        .bind(collection)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
    match maybe_row {
        None => Ok(None),
        Some(row) => Ok(Some(parse_row(&row)?)),
    }
}

pub(super) async fn insert_document(
    conn: &mut SqliteConnection,
    collection: &str,
    doc: &Document,
) -> DbResult<()> {
    let query_str = "INSERT INTO documents (collection, id, version, body) VALUES (?, ?, ?, ?)";
    sqlx::query(query_str)
        .bind(collection)
        .bind(doc.id().to_string())
        .bind(doc.version().as_i32())
        .bind(serde_json::to_string(doc.body())?)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
    Ok(())
}

pub(super) async fn update_document(
    conn: &mut SqliteConnection,
    collection: &str,
    doc: &Document,
) -> DbResult<()> {
    let query_str = "UPDATE documents SET version = ?, body = ? WHERE collection = ? AND id = ?";
    let done = sqlx::query(query_str)
        .bind(doc.version().as_i32())
        .bind(serde_json::to_string(doc.body())?)
        .bind(collection)
        .bind(doc.id().to_string())
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
    match done.rows_affected() {
        0 => Err(DbError::NotFound),
        1 => Ok(()),
        _ => Err(DbError::BackendError("Update affected more than one row".to_owned())),
    }
}

pub(super) async fn delete_document(
    conn: &mut SqliteConnection,
    collection: &str,
    id: &DocumentId,
) -> DbResult<()> {
    let query_str = "DELETE FROM documents WHERE collection = ? AND id = ?";
    let done = sqlx::query(query_str)
        .bind(collection)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
    match done.rows_affected() {
        0 => Err(DbError::NotFound),
        1 => Ok(()),
        _ => Err(DbError::BackendError("Deletion affected more than one row".to_owned())),
    }
}
