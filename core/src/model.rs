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

//! Generic data types shared by all services.
//!
//! Services should define their own `model` module with the types that are specific to their
//! domain.  Types in here are the building blocks that the generic layers of this crate operate
//! on: documents as they come out of the store and records as they go out to API consumers.

mod document;
pub use document::{Document, DocumentId, ID_FIELD, Record, VERSION_FIELD, Version};

/// Errors caused by invalid values in the model.
#[derive(Debug, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct ModelError(pub String);

/// Result type for this module.
pub type ModelResult<T> = Result<T, ModelError>;
