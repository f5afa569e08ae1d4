//! Flattened records and typed record construction
//!
//! A [`Record`] is a primary resource after link resolution, flattened to one
//! string per top-level field. Typed entities are built from records through
//! the [`FromRecord`] trait before they are handed to a sink.

mod character;

pub use character::Character;

use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur while building records
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Resource {id} is not a JSON object")]
    NotAnObject { id: u32 },

    #[error("Resource {id} is missing field '{field}'")]
    MissingField { id: u32, field: String },
}

/// Result type for record operations
pub type RecordResult<T> = Result<T, RecordError>;

/// A fully resolved, flattened primary resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    id: u32,
    fields: BTreeMap<String, String>,
}

impl Record {
    /// Flattens a decoded resource body into a record
    ///
    /// Strings are kept verbatim, numbers and booleans are formatted, `null`
    /// becomes the empty string, arrays are flattened element-wise and joined
    /// with `delimiter`, and nested objects are kept as compact JSON.
    pub fn flatten(id: u32, body: &Value, delimiter: &str) -> RecordResult<Self> {
        let object = body.as_object().ok_or(RecordError::NotAnObject { id })?;

        let fields = object
            .iter()
            .map(|(name, value)| (name.clone(), flatten_value(value, delimiter)))
            .collect();

        Ok(Self { id, fields })
    }

    /// Id of the primary resource this record was built from
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Like [`Record::get`], but a missing field is an error
    pub fn require(&self, field: &str) -> RecordResult<&str> {
        self.get(field).ok_or_else(|| RecordError::MissingField {
            id: self.id,
            field: field.to_string(),
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn flatten_value(value: &Value, delimiter: &str) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| flatten_value(item, delimiter))
            .collect::<Vec<_>>()
            .join(delimiter),
        Value::Object(_) => value.to_string(),
    }
}

/// Builds a typed entity from a resolved record
pub trait FromRecord: Sized + Send + 'static {
    fn from_record(record: &Record) -> RecordResult<Self>;
}

/// Records pass through unchanged, for sinks that store raw fields
impl FromRecord for Record {
    fn from_record(record: &Record) -> RecordResult<Self> {
        Ok(record.clone())
    }
}
