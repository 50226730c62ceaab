//! Core types for the card reviewer.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PayloadError, Result};
use crate::timestamp;

/// Card as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub text: String,
    pub translation: String,
    pub image_path: Option<String>,
    #[serde(with = "crate::timestamp")]
    pub met_at: DateTime<Utc>,
    pub remembered: bool,
    pub active: bool,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// One field of a submitted payload.
///
/// Keeps "key missing", "explicit null" and "wrong JSON type" apart, since
/// the validation rules treat them differently per field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldValue<T> {
    #[default]
    Absent,
    Null,
    WrongType,
    Present(T),
}

impl<T> FieldValue<T> {
    pub fn present(&self) -> Option<&T> {
        match self {
            Self::Present(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Card fields submitted for create or update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardPayload {
    pub text: FieldValue<String>,
    pub translation: FieldValue<String>,
    pub met_at: FieldValue<String>,
    pub remembered: FieldValue<bool>,
    pub active: FieldValue<bool>,
}

impl CardPayload {
    /// Payload with `text` and `translation` set and nothing else.
    pub fn new(text: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            text: FieldValue::Present(text.into()),
            translation: FieldValue::Present(translation.into()),
            ..Self::default()
        }
    }

    pub fn with_met_at(mut self, met_at: impl Into<String>) -> Self {
        self.met_at = FieldValue::Present(met_at.into());
        self
    }

    pub fn with_remembered(mut self, remembered: bool) -> Self {
        self.remembered = FieldValue::Present(remembered);
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = FieldValue::Present(active);
        self
    }

    /// Read a payload from a JSON object. Unknown keys are ignored.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = match value {
            Value::Object(object) => object,
            other => return Err(PayloadError::NotAnObject(json_kind(other))),
        };

        Ok(Self {
            text: string_field(object, "text"),
            translation: string_field(object, "translation"),
            met_at: string_field(object, "met_at"),
            remembered: bool_field(object, "remembered"),
            active: bool_field(object, "active"),
        })
    }

    pub fn trimmed_text(&self) -> Option<&str> {
        self.text.present().map(|text| text.trim())
    }

    pub fn trimmed_translation(&self) -> Option<&str> {
        self.translation.present().map(|translation| translation.trim())
    }

    /// `met_at` if it was supplied and parses.
    pub fn met_at(&self) -> Option<DateTime<Utc>> {
        self.met_at.present().and_then(|raw| timestamp::parse(raw))
    }

    pub fn remembered(&self) -> Option<bool> {
        self.remembered.present().copied()
    }

    pub fn active(&self) -> Option<bool> {
        self.active.present().copied()
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> FieldValue<String> {
    match object.get(key) {
        None => FieldValue::Absent,
        Some(Value::Null) => FieldValue::Null,
        Some(Value::String(value)) => FieldValue::Present(value.clone()),
        Some(_) => FieldValue::WrongType,
    }
}

fn bool_field(object: &Map<String, Value>, key: &str) -> FieldValue<bool> {
    match object.get(key) {
        None => FieldValue::Absent,
        Some(Value::Null) => FieldValue::Null,
        Some(Value::Bool(value)) => FieldValue::Present(*value),
        Some(_) => FieldValue::WrongType,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validation failures keyed by field name.
///
/// Serializes as `{"field": ["reason", ...]}` and only ever holds fields with
/// at least one reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single reason for a single field.
    pub fn single(field: &str, reason: &str) -> Self {
        let mut errors = Self::new();
        errors.add(field, reason);
        errors
    }

    pub fn add(&mut self, field: &str, reason: &str) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(reason.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, reasons) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{} {}", field, reasons.join(", "))?;
            first = false;
        }
        Ok(())
    }
}
