//! Core card library used by the reviewer backend.
//!
//! Provides:
//! - Card and card payload types
//! - Field validation for create/update payloads
//! - The `YYYY-MM-DD HH:MM:SS UTC` timestamp format
//! - Target sources for next-card selection

pub mod error;
pub mod selection;
pub mod timestamp;
pub mod types;
pub mod validation;

pub use error::{PayloadError, Result};
pub use selection::{bucket_order, FixedTarget, RandomTarget, TargetSource};
pub use types::{Card, CardPayload, FieldErrors, FieldValue};
pub use validation::{uniqueness_candidate, validate};
