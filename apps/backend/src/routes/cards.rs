//! Card endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use serde_json::Value;

use card_core::PayloadError;

use super::parse_card_id;
use crate::error::Result;
use crate::models::*;
use crate::AppState;

/// GET /api/cards
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Card>>> {
    let cards = state.cards.list_cards().await?;
    Ok(Json(cards.as_ref().clone()))
}

/// GET /api/cards/next
/// Returns the next card to review
pub async fn next(State(state): State<AppState>) -> Result<Json<Card>> {
    let card = state.cards.next_card().await?;
    Ok(Json(card))
}

/// GET /api/cards/:id
pub async fn get(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<Card>> {
    let card_id = parse_card_id(path)?;
    let card = state.cards.get_card(card_id).await?;
    Ok(Json(card))
}

/// POST /api/cards
pub async fn create(
    State(state): State<AppState>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Card>)> {
    let payload = read_payload(body)?;
    let card = state.cards.create_card(&payload).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

/// PUT /api/cards/:id
pub async fn update(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<Card>> {
    let card_id = parse_card_id(path)?;
    let payload = read_payload(body)?;
    let card = state.cards.update_card(card_id, &payload).await?;
    Ok(Json(card))
}

/// DELETE /api/cards/:id
/// Deletes the card and its image files
pub async fn delete(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<DeleteCardResponse>> {
    let card_id = parse_card_id(path)?;
    state.cards.delete_card(card_id).await?;
    Ok(Json(DeleteCardResponse { deleted: card_id }))
}

fn read_payload(body: std::result::Result<Json<Value>, JsonRejection>) -> Result<CardPayload> {
    let Json(value) =
        body.map_err(|rejection| PayloadError::InvalidJson(rejection.body_text()))?;
    Ok(CardPayload::from_json(&value)?)
}
