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

//! Persistence capability for resources stored in the document store.

use crate::db::{Db, DbError, documents};
use crate::driver::{DriverError, DriverResult};
use crate::model::{Document, DocumentId, ID_FIELD, ModelResult, Record, VERSION_FIELD, Version};
use crate::query::{FieldName, Literal, Predicate, QuerySpec};
use async_trait::async_trait;
use derivative::Derivative;
use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;

/// Schema of a resource type persisted in the document store.
///
/// Deserializing a payload into the implementing type enforces required fields and their types,
/// and drops any fields the schema does not know about.  Serializing it back yields the body that
/// gets stored.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name of the collection that holds the documents of this resource.
    const COLLECTION: &'static str;

    /// Checks the constraints that deserialization alone cannot express.
    fn validate(&self) -> ModelResult<()> {
        Ok(())
    }
}

/// Relation to attach to a fetched record: all documents of `collection` whose `foreign_field`
/// holds the id of the record are stored as an array under `field`.
#[derive(Clone, Debug, PartialEq)]
pub struct Expansion {
    /// Name of the field of the record that receives the related documents.
    pub field: &'static str,

    /// Collection that holds the related documents.
    pub collection: &'static str,

    /// Field of the related documents that references the record.
    pub foreign_field: FieldName,
}

impl Expansion {
    /// Creates a new expansion from hardcoded names.
    pub fn new(field: &'static str, collection: &'static str, foreign_field: &'static str) -> Self {
        Self { field, collection, foreign_field: FieldName::from(foreign_field) }
    }
}

/// Options for `Repository::update_by_id`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UpdateOptions {
    /// Whether to return the record after the update (true) or before it (false).
    pub return_updated: bool,

    /// Whether to run the resource validations on the updated record.
    pub validate: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self { return_updated: true, validate: true }
    }
}

/// Persistence operations on the records of a resource.
///
/// Operations that target a single record signal its absence by returning `None`.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Returns the records that match `spec`, in the order, page and projection it requests.
    async fn find_all(&self, spec: &QuerySpec) -> DriverResult<Vec<Record>>;

    /// Returns the record `id` with the related documents described by `expand` attached.
    async fn find_by_id(&self, id: &DocumentId, expand: &[Expansion])
    -> DriverResult<Option<Record>>;

    /// Validates `payload` and stores it as a new record.
    async fn create(&self, payload: Map<String, Value>) -> DriverResult<Record>;

    /// Merges `patch` into the record `id`.
    async fn update_by_id(
        &self,
        id: &DocumentId,
        patch: Map<String, Value>,
        options: UpdateOptions,
    ) -> DriverResult<Option<Record>>;

    /// Deletes the record `id`.
    async fn delete_by_id(&self, id: &DocumentId) -> DriverResult<Option<()>>;
}

/// Runs the fields of a would-be document body through the schema of `R`.
fn normalize<R: Resource>(
    fields: Map<String, Value>,
    validate: bool,
) -> DriverResult<Map<String, Value>> {
    let resource = serde_json::from_value::<R>(Value::Object(fields)).map_err(|e| {
        DriverError::InvalidInput(format!("Invalid {} data: {}", R::COLLECTION, e))
    })?;
    if validate {
        resource.validate()?;
    }
    match serde_json::to_value(&resource) {
        Ok(Value::Object(body)) => Ok(body),
        Ok(_) => Err(DriverError::BackendError(format!(
            "Schema for {} does not serialize to an object",
            R::COLLECTION
        ))),
        Err(e) => Err(DriverError::BackendError(e.to_string())),
    }
}

/// A `Repository` for resources of type `R` backed by the document store.
#[derive(Derivative)]
#[derivative(Clone(bound = ""))]
pub struct DocumentRepository<R: Resource> {
    /// The database holding the document store.
    db: Arc<dyn Db + Send + Sync>,

    /// Marker for the resource type.
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> DocumentRepository<R> {
    /// Creates a new repository backed by `db`.
    pub fn new(db: Arc<dyn Db + Send + Sync>) -> Self {
        Self { db, _resource: PhantomData }
    }
}

#[async_trait]
impl<R: Resource> Repository for DocumentRepository<R> {
    async fn find_all(&self, spec: &QuerySpec) -> DriverResult<Vec<Record>> {
        let docs = documents::find_documents(&mut self.db.ex().await?, R::COLLECTION, spec).await?;
        debug!("Found {} documents in {}", docs.len(), R::COLLECTION);
        Ok(docs.into_iter().map(|doc| spec.projection().apply(doc.into_record())).collect())
    }

    async fn find_by_id(
        &self,
        id: &DocumentId,
        expand: &[Expansion],
    ) -> DriverResult<Option<Record>> {
        let Some(doc) = documents::get_document(&mut self.db.ex().await?, R::COLLECTION, id).await?
        else {
            return Ok(None);
        };

        let mut record = doc.into_record();
        for expansion in expand {
            let spec = QuerySpec::default().with_predicate(Predicate::eq(
                expansion.foreign_field.clone(),
                Literal::Text(id.to_string()),
            ));
            let related =
                documents::find_documents(&mut self.db.ex().await?, expansion.collection, &spec)
                    .await?;
            let related = related
                .into_iter()
                .map(|doc| Value::Object(doc.into_record().into_map()))
                .collect::<Vec<Value>>();
            record.insert(expansion.field, Value::Array(related));
        }
        Ok(Some(record))
    }

    async fn create(&self, payload: Map<String, Value>) -> DriverResult<Record> {
        let body = normalize::<R>(payload, true)?;
        let doc = Document::new(DocumentId::new_random(), Version::initial(), body);
        documents::insert_document(&mut self.db.ex().await?, R::COLLECTION, &doc).await?;
        debug!("Created document {} in {}", doc.id(), R::COLLECTION);
        Ok(doc.into_record())
    }

    async fn update_by_id(
        &self,
        id: &DocumentId,
        patch: Map<String, Value>,
        options: UpdateOptions,
    ) -> DriverResult<Option<Record>> {
        let mut tx = self.db.begin().await?;

        let Some(current) = documents::get_document(tx.ex(), R::COLLECTION, id).await? else {
            return Ok(None);
        };

        let mut fields = current.body().clone();
        for (key, value) in patch {
            if key != ID_FIELD && key != VERSION_FIELD {
                fields.insert(key, value);
            }
        }
        let body = normalize::<R>(fields, options.validate)?;

        let updated = Document::new(*id, current.version().next(), body);
        documents::update_document(tx.ex(), R::COLLECTION, &updated).await?;
        tx.commit().await?;
        debug!("Updated document {} in {}", id, R::COLLECTION);

        if options.return_updated {
            Ok(Some(updated.into_record()))
        } else {
            Ok(Some(current.into_record()))
        }
    }

    async fn delete_by_id(&self, id: &DocumentId) -> DriverResult<Option<()>> {
        match documents::delete_document(&mut self.db.ex().await?, R::COLLECTION, id).await {
            Ok(()) => Ok(Some(())),
            Err(DbError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
