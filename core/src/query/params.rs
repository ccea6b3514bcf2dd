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

//! The `QueryParams` type.

use crate::query::{QueryError, QueryResult};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::mem;

/// Parameters that control the shape of the result instead of filtering it.
pub const RESERVED_PARAMS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Value of a single query parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    /// The parameter appeared once, as in `difficulty=easy`.
    Single(String),

    /// The parameter appeared more than once, as in `difficulty=easy&difficulty=medium`.
    List(Vec<String>),

    /// The parameter carried comparison operators, as in `price[gte]=100&price[lt]=500`.  Keys
    /// are the raw operator tokens.
    Operators(BTreeMap<String, String>),
}

/// Query parameters of a request, keyed by field name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryParams(BTreeMap<String, ParamValue>);

/// Splits a raw parameter `key` like `price[gte]` into its field and operator parts.
fn split_operator(key: &str) -> (&str, Option<&str>) {
    if let Some(stripped) = key.strip_suffix(']') {
        if let Some((field, op)) = stripped.split_once('[') {
            return (field, Some(op));
        }
    }
    (key, None)
}

impl QueryParams {
    /// Parses the `raw` query string of a request, if any.
    pub fn parse(raw: Option<&str>) -> QueryResult<Self> {
        let pairs = match raw {
            Some(raw) => serde_urlencoded::from_str::<Vec<(String, String)>>(raw)
                .map_err(|e| QueryError(format!("Cannot decode query string: {}", e)))?,
            None => vec![],
        };
        Self::from_pairs(pairs)
    }

    /// Builds the parameters from already-decoded `(key, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            params.push(key.as_ref(), value.into())?;
        }
        Ok(params)
    }

    /// Records one occurrence of `key` with `value`.
    fn push(&mut self, key: &str, value: String) -> QueryResult<()> {
        let (field, op) = split_operator(key);
        match (self.0.entry(field.to_owned()), op) {
            (Entry::Vacant(e), None) => {
                e.insert(ParamValue::Single(value));
            }

            (Entry::Vacant(e), Some(op)) => {
                let mut ops = BTreeMap::default();
                ops.insert(op.to_owned(), value);
                e.insert(ParamValue::Operators(ops));
            }

            (Entry::Occupied(mut e), None) => {
                let current = e.get_mut();
                match current {
                    ParamValue::Single(previous) => {
                        let previous = mem::take(previous);
                        *current = ParamValue::List(vec![previous, value]);
                    }
                    ParamValue::List(values) => values.push(value),
                    ParamValue::Operators(_) => {
                        return Err(QueryError(format!(
                            "Parameter '{}' cannot have both a value and operators",
                            field
                        )));
                    }
                }
            }

            (Entry::Occupied(mut e), Some(op)) => match e.get_mut() {
                ParamValue::Operators(ops) => {
                    ops.insert(op.to_owned(), value);
                }
                _ => {
                    return Err(QueryError(format!(
                        "Parameter '{}' cannot have both a value and operators",
                        field
                    )));
                }
            },
        }
        Ok(())
    }

    /// Sets `key` to the single `value`, replacing whatever was there before.
    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.0.insert(key.into(), ParamValue::Single(value.into()));
        self
    }

    /// Gets the value of the control parameter `key`.
    ///
    /// Control parameters are plain strings.  If the parameter was given more than once, the last
    /// occurrence wins.  Parameters given with operators are not control parameters and are
    /// ignored.
    pub fn control(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            ParamValue::Single(value) => Some(value.as_str()),
            ParamValue::List(values) => values.last().map(String::as_str),
            ParamValue::Operators(_) => None,
        }
    }

    /// Iterates over all parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Returns true if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
