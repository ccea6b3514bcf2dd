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

//! The `QuerySpec` type and its building blocks.

use crate::model::{ID_FIELD, Record, VERSION_FIELD};
use crate::query::{QueryError, QueryResult};
use serde_json::{Map, Value};
use std::fmt;

/// Name of a possibly-nested field of a document, such as `price` or `location.address`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct FieldName(String);

impl FieldName {
    /// Creates a field name from `s`, validating that it is a dot-separated list of
    /// identifiers.
    pub fn new<S: Into<String>>(s: S) -> QueryResult<Self> {
        let s = s.into();
        let valid = !s.is_empty()
            && s.split('.').all(|segment| {
                !segment.is_empty()
                    && segment.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
            });
        if !valid {
            return Err(QueryError(format!("Invalid field name '{}'", s)));
        }
        Ok(Self(s))
    }

    /// Returns the field name as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the segments of the possibly-nested field name.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Returns true if this names a top-level field.
    pub fn is_top_level(&self) -> bool {
        !self.0.contains('.')
    }

    /// Returns the field name as a JSON path suitable for SQLite's `json_extract`.
    pub fn json_path(&self) -> String {
        format!("$.{}", self.0)
    }
}

impl From<&'static str> for FieldName {
    /// Creates a field name from a hardcoded string, which must be valid.
    fn from(s: &'static str) -> Self {
        FieldName::new(s).expect("Hardcoded field names must be valid")
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A typed value to compare fields against.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    /// A boolean.
    Bool(bool),

    /// An integer.
    Integer(i64),

    /// A finite floating point number.
    Float(f64),

    /// Any string that does not look like any of the other types.
    Text(String),
}

impl Literal {
    /// Infers the type of the raw query string value `s`.
    pub fn infer(s: &str) -> Self {
        if let Ok(i) = s.parse::<i64>() {
            return Literal::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            if f.is_finite() {
                return Literal::Float(f);
            }
        }
        match s {
            "true" => Literal::Bool(true),
            "false" => Literal::Bool(false),
            s => Literal::Text(s.to_owned()),
        }
    }

    /// Returns the literals that an exact match on the raw query string value `s` accepts.
    ///
    /// This is the inferred literal plus, if that is not text, the verbatim text so that
    /// string fields holding values like `"123"` still match.
    pub fn candidates(s: &str) -> Vec<Self> {
        match Literal::infer(s) {
            text @ Literal::Text(_) => vec![text],
            typed => vec![typed, Literal::Text(s.to_owned())],
        }
    }

    /// Returns true if the literal is a number and can thus be used in ordering comparisons.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Literal::Integer(_) | Literal::Float(_))
    }

    /// Converts the literal to its JSON representation.
    pub fn to_json(&self) -> Value {
        match self {
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Integer(i) => Value::from(*i),
            Literal::Float(f) => Value::from(*f),
            Literal::Text(s) => Value::String(s.clone()),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Text(s.to_owned())
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Integer(i)
    }
}

/// Comparison operators supported in predicates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ComparisonOp {
    /// Equal to.
    Eq,

    /// Greater than.
    Gt,

    /// Greater than or equal to.
    Gte,

    /// Less than.
    Lt,

    /// Less than or equal to.
    Lte,
}

/// Mapping of query string operator tokens to operators and their SQL representation.
const OPERATORS: &[(&str, ComparisonOp, &str)] = &[
    ("eq", ComparisonOp::Eq, "="),
    ("gt", ComparisonOp::Gt, ">"),
    ("gte", ComparisonOp::Gte, ">="),
    ("lt", ComparisonOp::Lt, "<"),
    ("lte", ComparisonOp::Lte, "<="),
];

impl ComparisonOp {
    /// Parses the operator `token` as given in `field[token]=value`.
    pub fn from_token(token: &str) -> QueryResult<Self> {
        OPERATORS
            .iter()
            .find(|(name, _, _)| *name == token)
            .map(|(_, op, _)| *op)
            .ok_or_else(|| QueryError(format!("Unsupported operator '{}'", token)))
    }

    /// Returns the SQL operator for this comparison.
    pub fn sql(self) -> &'static str {
        OPERATORS
            .iter()
            .find(|(_, op, _)| *op == self)
            .map(|(_, _, sql)| *sql)
            .expect("All operators must be in the lookup table")
    }
}

/// A condition that documents must satisfy to be returned.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    /// Compares the value of a field against a literal.
    Compare {
        /// Field to compare.
        field: FieldName,

        /// Comparison to perform.
        op: ComparisonOp,

        /// Value to compare against.
        value: Literal,
    },

    /// Matches documents whose field equals any of the given literals.
    AnyOf {
        /// Field to compare.
        field: FieldName,

        /// Accepted values.  Never empty.
        values: Vec<Literal>,
    },
}

impl Predicate {
    /// Shorthand to create an equality predicate.
    pub fn eq<V: Into<Literal>>(field: FieldName, value: V) -> Self {
        Predicate::Compare { field, op: ComparisonOp::Eq, value: value.into() }
    }

    /// Returns the field this predicate applies to.
    pub fn field(&self) -> &FieldName {
        match self {
            Predicate::Compare { field, .. } => field,
            Predicate::AnyOf { field, .. } => field,
        }
    }
}

/// Direction of a sort key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortDirection {
    /// Smallest values first.
    Ascending,

    /// Largest values first.
    Descending,
}

/// A field to sort results by.
#[derive(Clone, Debug, PartialEq)]
pub struct SortKey {
    /// Field to sort by.
    pub field: FieldName,

    /// Direction of the sort.
    pub direction: SortDirection,
}

/// Selection of the fields to return in every record.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Projection {
    /// Returns all fields.
    #[default]
    All,

    /// Returns only the given fields plus the identifier.
    Include(Vec<FieldName>),

    /// Returns all fields except the given ones.
    Exclude(Vec<FieldName>),
}

/// Looks up the value of the nested field `segments` in `map`.
fn lookup<'a>(map: &'a Map<String, Value>, segments: &[&str]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    let value = map.get(*first)?;
    if rest.is_empty() { Some(value) } else { lookup(value.as_object()?, rest) }
}

/// Stores `value` in the nested field `segments` of `map`, creating intermediate objects.
fn insert_path(map: &mut Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => (),
        [last] => {
            map.insert((*last).to_owned(), value);
        }
        [first, rest @ ..] => {
            let child = map
                .entry((*first).to_owned())
                .or_insert_with(|| Value::Object(Map::default()));
            if let Value::Object(child) = child {
                insert_path(child, rest, value);
            }
        }
    }
}

/// Removes the nested field `segments` from `map`, if present.
fn remove_path(map: &mut Map<String, Value>, segments: &[&str]) {
    match segments {
        [] => (),
        [last] => {
            map.remove(*last);
        }
        [first, rest @ ..] => {
            if let Some(Value::Object(child)) = map.get_mut(*first) {
                remove_path(child, rest);
            }
        }
    }
}

impl Projection {
    /// Returns the projection used when the caller does not select fields.
    pub fn hide_internal() -> Self {
        Projection::Exclude(vec![FieldName::from(VERSION_FIELD)])
    }

    /// Narrows down the fields of `record` according to this projection.
    pub fn apply(&self, record: Record) -> Record {
        match self {
            Projection::All => record,

            Projection::Include(fields) => {
                let source = record.into_map();
                let mut output = Map::with_capacity(fields.len() + 1);
                if let Some(id) = source.get(ID_FIELD) {
                    output.insert(ID_FIELD.to_owned(), id.clone());
                }
                for field in fields {
                    let segments = field.segments().collect::<Vec<&str>>();
                    if let Some(value) = lookup(&source, &segments) {
                        insert_path(&mut output, &segments, value.clone());
                    }
                }
                Record::new(output)
            }

            Projection::Exclude(fields) => {
                let mut output = record.into_map();
                for field in fields {
                    let segments = field.segments().collect::<Vec<&str>>();
                    remove_path(&mut output, &segments);
                }
                Record::new(output)
            }
        }
    }
}

/// A window over an ordered result set.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Page {
    /// Number of records to skip.
    pub skip: u64,

    /// Maximum number of records to return.
    pub limit: u64,
}

/// Description of a read over one collection that has not been executed yet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuerySpec {
    /// Conjunctive predicates that all returned documents must satisfy.
    filter: Vec<Predicate>,

    /// Sort keys in decreasing precedence.
    sort: Vec<SortKey>,

    /// Fields to return.
    projection: Projection,

    /// Window to return, or none to return all matching documents.
    page: Option<Page>,
}

impl QuerySpec {
    /// Adds a `predicate` after any existing ones.
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.filter.push(predicate);
        self
    }

    /// Adds a sort key with lower precedence than any existing ones.
    pub fn with_sort_key(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    /// Replaces the projection.
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Replaces the page.
    pub fn with_page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    /// Returns the predicates.
    pub fn filter(&self) -> &[Predicate] {
        &self.filter
    }

    /// Returns the sort keys.
    pub fn sort(&self) -> &[SortKey] {
        &self.sort
    }

    /// Returns the projection.
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Returns the page, if any.
    pub fn page(&self) -> Option<Page> {
        self.page
    }
}
