//! Card operations exposed to the HTTP layer.
//!
//! Sequences the store, the image directory and the listing cache, and
//! holds the per-card lock around anything that touches both a row and its
//! files.

use std::sync::Arc;

use crate::db::Database;
use crate::error::{ApiError, Result};
use crate::models::{Card, CardPayload, ImageUpload, ReconcileReport};
use crate::services::archive::{ArchiveExporter, ArchiveFile};
use crate::services::cache::ChangeCache;
use crate::services::images::ImageStore;
use crate::services::locks::CardLocks;
use crate::services::picker::SelectionPicker;

pub struct CardService {
    db: Arc<Database>,
    images: ImageStore,
    archive: ArchiveExporter,
    picker: SelectionPicker,
    cache: ChangeCache,
    locks: CardLocks,
}

impl CardService {
    pub fn new(
        db: Arc<Database>,
        images: ImageStore,
        archive: ArchiveExporter,
        picker: SelectionPicker,
    ) -> Self {
        Self {
            db,
            images,
            archive,
            picker,
            cache: ChangeCache::new(),
            locks: CardLocks::new(),
        }
    }

    pub fn cache(&self) -> &ChangeCache {
        &self.cache
    }

    /// All cards in insertion order, served from the change cache.
    pub async fn list_cards(&self) -> Result<Arc<Vec<Card>>> {
        self.cache.get_all(&self.db).await
    }

    pub async fn next_card(&self) -> Result<Card> {
        self.picker
            .pick_next(&self.db)
            .await?
            .map(|card| card.into_api_card())
            .ok_or_else(|| ApiError::NotFound("No active cards".to_string()))
    }

    pub async fn get_card(&self, card_id: i64) -> Result<Card> {
        self.db
            .get_card(card_id)
            .await?
            .map(|card| card.into_api_card())
            .ok_or_else(|| ApiError::NotFound(format!("Card {} not found", card_id)))
    }

    pub async fn create_card(&self, payload: &CardPayload) -> Result<Card> {
        let card = self.db.create_card(payload).await?;
        tracing::info!("Created card {}", card.id);
        Ok(card.into_api_card())
    }

    pub async fn update_card(&self, card_id: i64, payload: &CardPayload) -> Result<Card> {
        let _guard = self.locks.lock(card_id).await;
        let card = self.db.update_card(card_id, payload).await?;
        Ok(card.into_api_card())
    }

    pub async fn set_card_image(&self, card_id: i64, upload: Option<&ImageUpload>) -> Result<Card> {
        let _guard = self.locks.lock(card_id).await;
        let card = self.images.set_image(&self.db, card_id, upload).await?;
        Ok(card.into_api_card())
    }

    pub async fn clear_card_image(&self, card_id: i64) -> Result<Card> {
        let _guard = self.locks.lock(card_id).await;
        let card = self.images.clear_image(&self.db, card_id).await?;
        Ok(card.into_api_card())
    }

    /// Delete a card and every image file it owns, as one unit.
    pub async fn delete_card(&self, card_id: i64) -> Result<()> {
        let _guard = self.locks.lock(card_id).await;
        let images = &self.images;
        self.db
            .delete_card(card_id, |_| async move {
                images.remove_card_files(card_id).await.map(|_| ())
            })
            .await?;
        tracing::info!("Deleted card {}", card_id);
        Ok(())
    }

    pub async fn export_storage(&self) -> Result<ArchiveFile> {
        self.archive.export_zip().await
    }

    pub async fn reconcile_images(&self) -> Result<ReconcileReport> {
        self.images.reconcile(&self.db, &self.locks).await
    }
}
