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

//! The `Document`, `DocumentId`, `Record` and `Version` data types.

use crate::model::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Name of the field that carries the document identifier in records.
pub const ID_FIELD: &str = "id";

/// Name of the field that carries the document version in records.
pub const VERSION_FIELD: &str = "__v";

/// Identifier of a document, unique within its collection.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Generates a new random identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the UUID backing this identifier.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for DocumentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for DocumentId {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        match Uuid::parse_str(s) {
            Ok(uuid) => Ok(Self(uuid)),
            Err(e) => Err(ModelError(format!("Invalid document id '{}': {}", s, e))),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

/// A document's current version number.  We store this as an u32 but guarantee that it is
/// usable in an i32 context because the PostgreSQL database backend needs it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Version(u32);

impl Version {
    /// Returns the initial version assigned to new documents.
    pub fn initial() -> Version {
        Version(0)
    }

    /// Returns the next version to assign to an updated document.
    pub fn next(self) -> Version {
        Version(self.0 + 1)
    }

    /// Creates a version from an `i32` with range validation.
    pub fn from_i32(version: i32) -> ModelResult<Version> {
        match u32::try_from(version) {
            Ok(version) => Ok(Version(version)),
            Err(e) => Err(ModelError(format!("Version cannot be represented: {}", e))),
        }
    }

    /// Creates a version from an `i64` with range validation.
    pub fn from_i64(version: i64) -> ModelResult<Version> {
        match i32::try_from(version) {
            Ok(version) => Version::from_i32(version),
            Err(e) => Err(ModelError(format!("Version cannot be represented: {}", e))),
        }
    }

    /// Returns the version as an `i32`.
    pub fn as_i32(&self) -> i32 {
        i32::try_from(self.0).expect("i32 compatibility validated at construction time")
    }

    /// Returns the version as a `u32`.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

/// A document as held by the document store.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// Unique identifier of the document within its collection.
    id: DocumentId,

    /// Revision of the document, bumped on every update.
    version: Version,

    /// Contents of the document as provided by the resource schema.
    body: Map<String, Value>,
}

impl Document {
    /// Creates a new document from its parts.
    pub fn new(id: DocumentId, version: Version, body: Map<String, Value>) -> Self {
        Self { id, version, body }
    }

    /// Returns the identifier of the document.
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Returns the version of the document.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the contents of the document.
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Converts the document into the full record that API consumers would see, before applying
    /// any projection.
    pub fn into_record(self) -> Record {
        let mut fields = Map::with_capacity(self.body.len() + 2);
        fields.insert(ID_FIELD.to_owned(), Value::String(self.id.to_string()));
        for (key, value) in self.body {
            if key != ID_FIELD && key != VERSION_FIELD {
                fields.insert(key, value);
            }
        }
        fields.insert(VERSION_FIELD.to_owned(), Value::from(self.version.as_u32()));
        Record(fields)
    }
}

/// A document in the shape returned to API consumers.
///
/// Records are plain JSON objects: the document identifier, the body fields and the version, as
/// narrowed down by a projection.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Creates a record from raw fields.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Gets the value of the top-level field `key`, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Sets the top-level field `key` to `value`.
    pub fn insert<K: Into<String>>(&mut self, key: K, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Returns the names of the top-level fields in the record.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns a view of the raw fields of the record.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the record and returns its raw fields.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}
