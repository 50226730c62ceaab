//! Per-card async locks.
//!
//! Serializes everything that touches one card's row and image files, so an
//! `image_path` never points at a file that is mid-write or already deleted.
//! Different cards never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct CardLocks {
    slots: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl CardLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `card_id`. Released when the guard drops.
    pub async fn lock(&self, card_id: i64) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // A slot nobody else holds a handle to is idle.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots.entry(card_id).or_default().clone()
        };
        slot.lock_owned().await
    }

    /// Number of cards with a live lock slot.
    pub fn active_slots(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|slot| Arc::strong_count(slot) > 1)
            .count()
    }
}
