//! Storage export endpoint

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::error::{ApiError, Result};
use crate::AppState;

/// GET /api/storage/export
/// Streams a zip of the image directory; the archive is discarded afterwards
pub async fn export(State(state): State<AppState>) -> Result<Response> {
    let archive = state.cards.export_storage().await?;
    let bytes = tokio::fs::read(archive.path())
        .await
        .map_err(|e| ApiError::storage(format!("reading {}", archive.file_name()), e))?;

    let disposition = format!("attachment; filename=\"{}\"", archive.file_name());
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
