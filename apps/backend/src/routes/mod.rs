//! HTTP handlers

pub mod cards;
pub mod images;
pub mod storage;

use axum::extract::{rejection::PathRejection, Path};

use crate::error::{ApiError, Result};

/// Card id from the URL. An id that is not a number resolves to no card.
fn parse_card_id(path: std::result::Result<Path<i64>, PathRejection>) -> Result<i64> {
    path.map(|Path(id)| id)
        .map_err(|rejection| ApiError::NotFound(format!("Card not found: {}", rejection.body_text())))
}
