//! Next-card selection.

use std::sync::Arc;

use card_core::selection::{bucket_order, RandomTarget, TargetSource};

use crate::db::Database;
use crate::error::Result;
use crate::models::DbCard;

/// Picks the next card to review.
///
/// A drawn target decides which `remembered` bucket is tried first; within
/// a bucket the active card met longest ago wins. When the preferred bucket
/// is empty the other one is used, so neither kind of card starves.
pub struct SelectionPicker {
    target: Arc<dyn TargetSource>,
}

impl Default for SelectionPicker {
    fn default() -> Self {
        Self::new(Arc::new(RandomTarget))
    }
}

impl SelectionPicker {
    pub fn new(target: Arc<dyn TargetSource>) -> Self {
        Self { target }
    }

    /// `None` when there is no active card at all.
    pub async fn pick_next(&self, db: &Database) -> Result<Option<DbCard>> {
        let target = self.target.draw();
        for remembered in bucket_order(target) {
            if let Some(card) = db.earliest_active(remembered).await? {
                tracing::debug!(
                    "Picked card {} (target remembered={}, got remembered={})",
                    card.id,
                    target,
                    remembered
                );
                return Ok(Some(card));
            }
        }
        Ok(None)
    }
}
