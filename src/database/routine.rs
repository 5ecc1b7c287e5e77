//! Routine invocations and result shaping.
//!
//! A routine call produces zero or more result sets. Callers never see the
//! driver's rows: they ask for an [`ExpectedReturn`] shape and receive the
//! matching [`RoutineOutput`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::manager::DatabaseError;

/// One row of a result set, keyed by column name
pub type Row = Map<String, Value>;

/// Ordered rows produced by one statement or cursor
pub type ResultSet = Vec<Row>;

/// Shape the caller wants back from a routine call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedReturn {
    /// Side-effecting call; the raw execution result is returned
    #[default]
    None,
    /// First row of the first result set
    Single,
    /// Every result set, optionally keyed by name
    Multi,
}

/// Typed input parameter bound to a routine argument
#[derive(Debug, Clone, PartialEq)]
pub enum RoutineParam {
    Null,
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Json(Value),
}

impl RoutineParam {
    /// Convert an untyped JSON value, picking the narrowest integer width
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => RoutineParam::Null,
            Value::Bool(b) => RoutineParam::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    match i32::try_from(i) {
                        Ok(small) => RoutineParam::Int(small),
                        Err(_) => RoutineParam::BigInt(i),
                    }
                } else if let Some(f) = n.as_f64() {
                    RoutineParam::Float(f)
                } else {
                    RoutineParam::Text(n.to_string())
                }
            }
            Value::String(s) => RoutineParam::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => RoutineParam::Json(value.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RoutineParam::Null)
    }
}

impl From<bool> for RoutineParam {
    fn from(v: bool) -> Self {
        RoutineParam::Bool(v)
    }
}

impl From<i32> for RoutineParam {
    fn from(v: i32) -> Self {
        RoutineParam::Int(v)
    }
}

impl From<i64> for RoutineParam {
    fn from(v: i64) -> Self {
        RoutineParam::BigInt(v)
    }
}

impl From<f64> for RoutineParam {
    fn from(v: f64) -> Self {
        RoutineParam::Float(v)
    }
}

impl From<&str> for RoutineParam {
    fn from(v: &str) -> Self {
        RoutineParam::Text(v.to_string())
    }
}

impl From<String> for RoutineParam {
    fn from(v: String) -> Self {
        RoutineParam::Text(v)
    }
}

impl From<Uuid> for RoutineParam {
    fn from(v: Uuid) -> Self {
        RoutineParam::Uuid(v)
    }
}

impl From<DateTime<Utc>> for RoutineParam {
    fn from(v: DateTime<Utc>) -> Self {
        RoutineParam::Timestamp(v)
    }
}

impl From<NaiveDate> for RoutineParam {
    fn from(v: NaiveDate) -> Self {
        RoutineParam::Date(v)
    }
}

impl From<Value> for RoutineParam {
    fn from(v: Value) -> Self {
        RoutineParam::from_json(&v)
    }
}

impl<T: Into<RoutineParam>> From<Option<T>> for RoutineParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(RoutineParam::Null)
    }
}

/// A single named-routine call, built per request and discarded after
#[derive(Debug, Clone)]
pub struct RoutineInvocation {
    name: String,
    params: Vec<(String, RoutineParam)>,
    expected: ExpectedReturn,
    result_set_names: Vec<String>,
}

impl RoutineInvocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            expected: ExpectedReturn::None,
            result_set_names: Vec::new(),
        }
    }

    /// Add a parameter; a repeated name replaces the earlier value
    pub fn param(mut self, name: impl Into<String>, value: impl Into<RoutineParam>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.params.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.params.push((name, value)),
        }
        self
    }

    /// Add every field of a validated JSON object as a parameter
    pub fn json_params(mut self, object: &Map<String, Value>) -> Self {
        for (key, value) in object {
            self = self.param(key.clone(), RoutineParam::from_json(value));
        }
        self
    }

    pub fn expect(mut self, expected: ExpectedReturn) -> Self {
        self.expected = expected;
        self
    }

    /// Name the result sets of a `Multi` call, by position
    pub fn result_sets<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.result_set_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[(String, RoutineParam)] {
        &self.params
    }

    pub fn expected(&self) -> ExpectedReturn {
        self.expected
    }

    pub fn result_set_names(&self) -> &[String] {
        &self.result_set_names
    }

    /// Reject routine and parameter names that are not plain identifiers,
    /// and result set names given more than once
    pub fn validate(&self) -> Result<(), DatabaseError> {
        if !is_valid_routine_name(&self.name) {
            return Err(DatabaseError::InvalidIdentifier(self.name.clone()));
        }
        for (name, _) in &self.params {
            if !is_valid_identifier(name) {
                return Err(DatabaseError::InvalidIdentifier(name.clone()));
            }
        }
        for (i, name) in self.result_set_names.iter().enumerate() {
            if self.result_set_names[..i].contains(name) {
                return Err(DatabaseError::InvalidIdentifier(format!(
                    "duplicate result set name '{}'",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Everything a routine call produced, before shaping
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResult {
    pub result_sets: Vec<ResultSet>,
    /// Row count the driver reports for the call statement. For a function
    /// invoked as `SELECT * FROM f(...)` this is the number of rows the call
    /// returned, not the rows the function modified internally.
    pub rows_affected: u64,
}

impl RawResult {
    pub fn new(result_sets: Vec<ResultSet>, rows_affected: u64) -> Self {
        Self { result_sets, rows_affected }
    }
}

/// Result of a routine call in the shape the caller asked for
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RoutineOutput {
    Raw(RawResult),
    Single(Option<Row>),
    Multi(Vec<ResultSet>),
    Named(BTreeMap<String, ResultSet>),
}

impl RoutineOutput {
    /// Coerce a raw result into the requested shape
    pub fn shape(raw: RawResult, expected: ExpectedReturn, names: &[String]) -> Self {
        match expected {
            ExpectedReturn::None => RoutineOutput::Raw(raw),
            ExpectedReturn::Single => {
                let first = raw
                    .result_sets
                    .into_iter()
                    .next()
                    .and_then(|set| set.into_iter().next());
                RoutineOutput::Single(first)
            }
            ExpectedReturn::Multi if !names.is_empty() => {
                let mut sets = raw.result_sets.into_iter();
                let named = names
                    .iter()
                    .map(|name| (name.clone(), sets.next().unwrap_or_default()))
                    .collect();
                RoutineOutput::Named(named)
            }
            ExpectedReturn::Multi => RoutineOutput::Multi(raw.result_sets),
        }
    }

    pub fn into_single(self) -> Option<Row> {
        match self {
            RoutineOutput::Single(row) => row,
            _ => None,
        }
    }

    pub fn into_named(self) -> BTreeMap<String, ResultSet> {
        match self {
            RoutineOutput::Named(named) => named,
            _ => BTreeMap::new(),
        }
    }

    pub fn into_result_sets(self) -> Vec<ResultSet> {
        match self {
            RoutineOutput::Raw(raw) => raw.result_sets,
            RoutineOutput::Single(row) => vec![row.into_iter().collect()],
            RoutineOutput::Multi(sets) => sets,
            RoutineOutput::Named(named) => named.into_values().collect(),
        }
    }

    /// Rows affected, when the raw shape was requested
    pub fn rows_affected(&self) -> Option<u64> {
        match self {
            RoutineOutput::Raw(raw) => Some(raw.rows_affected),
            _ => None,
        }
    }
}

/// Routine names: an identifier, optionally schema-qualified once
fn is_valid_routine_name(name: &str) -> bool {
    let mut parts = name.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(routine), None, None) => is_valid_identifier(routine),
        (Some(schema), Some(routine), None) => {
            is_valid_identifier(schema) && is_valid_identifier(routine)
        }
        _ => false,
    }
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
