//! Wire format for card timestamps: `YYYY-MM-DD HH:MM:SS UTC`.
//!
//! Also usable as a serde adapter via `#[serde(with = "card_core::timestamp")]`.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serializer};

/// chrono format string matching the wire format.
pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

fn shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| {
        Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2} UTC$")
            .expect("timestamp pattern is valid")
    })
}

/// Render a timestamp in wire format.
pub fn format(ts: &DateTime<Utc>) -> String {
    ts.format(FORMAT).to_string()
}

/// Parse a wire timestamp.
///
/// Returns `None` unless the input has exactly the wire shape (zero-padded
/// fields, single spaces, `UTC` suffix) and names a real calendar date and
/// time of day.
pub fn parse(input: &str) -> Option<DateTime<Utc>> {
    if !shape().is_match(input) {
        return None;
    }
    NaiveDateTime::parse_from_str(input, FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(ts))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
}
