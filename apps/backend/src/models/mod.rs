//! Database models and API types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Re-export shared types from card-core
pub use card_core::types::{Card, CardPayload, FieldErrors, FieldValue};

// === Database Entity Types ===

/// Card stored in SQLite
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct DbCard {
    pub id: i64,
    pub text: String,
    pub translation: String,
    pub image_path: Option<String>,
    pub met_at: DateTime<Utc>,
    pub remembered: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbCard {
    /// Convert to API card type
    pub fn into_api_card(self) -> Card {
        Card {
            id: self.id,
            text: self.text,
            translation: self.translation,
            image_path: self.image_path,
            met_at: self.met_at,
            remembered: self.remembered,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// === Service Types ===

/// Image file received for a card.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Client-side file name, used for the stored extension.
    pub file_name: Option<String>,
    /// Declared MIME type; must start with `image/`.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: Some(file_name.into()),
            content_type: Some(content_type.into()),
            bytes: bytes.into(),
        }
    }
}

/// Outcome of reconciling the image directory with the cards table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Files deleted because no card references them.
    pub removed_files: Vec<String>,
    /// Cards whose `image_path` was cleared because the file is gone.
    pub cleared_cards: Vec<i64>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.removed_files.is_empty() && self.cleared_cards.is_empty()
    }
}

// === API Response Types ===

/// Response for DELETE /api/cards/:id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteCardResponse {
    pub deleted: i64,
}
