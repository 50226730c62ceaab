//! Card image endpoints

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::PathRejection, Multipart, Path, State,
    },
    Json,
};

use super::parse_card_id;
use crate::error::{ApiError, Result};
use crate::models::{Card, ImageUpload};
use crate::AppState;

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// PUT /api/cards/:id/image
/// Stores the uploaded image, replacing any previous one
pub async fn upload(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Card>> {
    let card_id = parse_card_id(path)?;
    // A body that is not multipart at all counts as a missing upload.
    let upload = match multipart {
        Ok(mut multipart) => read_image_field(&mut multipart).await?,
        Err(_) => None,
    };

    let card = state.cards.set_card_image(card_id, upload.as_ref()).await?;
    Ok(Json(card))
}

/// DELETE /api/cards/:id/image
pub async fn clear(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<Card>> {
    let card_id = parse_card_id(path)?;
    let card = state.cards.clear_card_image(card_id).await?;
    Ok(Json(card))
}

async fn read_image_field(multipart: &mut Multipart) -> Result<Option<ImageUpload>> {
    let invalid = |e: axum::extract::multipart::MultipartError| {
        ApiError::BadRequest(format!("invalid multipart body: {}", e))
    };

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(String::from);
        let content_type = field.content_type().map(String::from);
        let bytes = field.bytes().await.map_err(invalid)?;

        return Ok(Some(ImageUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        }));
    }

    Ok(None)
}
