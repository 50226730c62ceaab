//! Field validation for card payloads.
//!
//! Every field is checked independently and all failures are reported
//! together. The uniqueness lookup needs stored state, so the caller performs
//! it and passes the answer in; see [`uniqueness_candidate`].

use crate::timestamp;
use crate::types::{CardPayload, FieldErrors, FieldValue};

pub const CANNOT_BE_NULL: &str = "cannot be null";
pub const SHOULD_BE_A_STRING: &str = "should be a string";
pub const CANNOT_BE_BLANK: &str = "cannot be blank";
pub const SHOULD_BE_UNIQUE: &str = "should be unique";
pub const INVALID_DATE_FORMAT: &str = "invalid date format";
pub const SHOULD_BE_BOOLEAN: &str = "should be Boolean";

/// The trimmed text whose uniqueness must be looked up, if the text is
/// otherwise valid.
pub fn uniqueness_candidate(payload: &CardPayload) -> Option<&str> {
    payload.trimmed_text().filter(|text| !text.is_empty())
}

/// Validate a payload.
///
/// `text_taken` tells whether a card other than the one being updated already
/// has the payload's trimmed text. It is only consulted when the text passes
/// every other check.
pub fn validate(payload: &CardPayload, text_taken: bool) -> FieldErrors {
    let mut errors = FieldErrors::new();

    match required_string(&payload.text) {
        Some(reason) => errors.add("text", reason),
        None if text_taken => errors.add("text", SHOULD_BE_UNIQUE),
        None => {}
    }

    if let Some(reason) = required_string(&payload.translation) {
        errors.add("translation", reason);
    }

    if let Some(reason) = optional_timestamp(&payload.met_at) {
        errors.add("met_at", reason);
    }

    if let Some(reason) = optional_boolean(&payload.remembered) {
        errors.add("remembered", reason);
    }

    if let Some(reason) = optional_boolean(&payload.active) {
        errors.add("active", reason);
    }

    errors
}

fn required_string(field: &FieldValue<String>) -> Option<&'static str> {
    match field {
        FieldValue::Absent | FieldValue::Null => Some(CANNOT_BE_NULL),
        FieldValue::WrongType => Some(SHOULD_BE_A_STRING),
        FieldValue::Present(value) if value.trim().is_empty() => Some(CANNOT_BE_BLANK),
        FieldValue::Present(_) => None,
    }
}

fn optional_timestamp(field: &FieldValue<String>) -> Option<&'static str> {
    match field {
        FieldValue::Absent | FieldValue::Null => None,
        FieldValue::WrongType => Some(INVALID_DATE_FORMAT),
        FieldValue::Present(raw) => timestamp::parse(raw)
            .is_none()
            .then_some(INVALID_DATE_FORMAT),
    }
}

fn optional_boolean(field: &FieldValue<bool>) -> Option<&'static str> {
    match field {
        FieldValue::Absent | FieldValue::Present(_) => None,
        FieldValue::Null | FieldValue::WrongType => Some(SHOULD_BE_BOOLEAN),
    }
}
