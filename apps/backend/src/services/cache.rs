//! Card listing cache keyed by the store's change counter.
//!
//! Holds at most one listing. A lookup is a hit only when the cached version
//! equals the store's current counter; wall-clock time plays no part.

use std::sync::{Arc, RwLock};

use crate::db::Database;
use crate::error::Result;
use crate::models::Card;

struct Entry {
    version: u64,
    cards: Arc<Vec<Card>>,
}

#[derive(Default)]
pub struct ChangeCache {
    entry: RwLock<Option<Entry>>,
}

impl ChangeCache {
    /// Empty cache; the first lookup always recomputes.
    pub fn new() -> Self {
        Self::default()
    }

    /// All cards, recomputed only when the store has changed.
    pub async fn get_all(&self, db: &Database) -> Result<Arc<Vec<Card>>> {
        // Read the counter before listing: the listing is then at least as
        // new as the version it is stored under.
        let version = db.change_counter();
        if let Some(cards) = self.lookup(version) {
            return Ok(cards);
        }

        let cards: Arc<Vec<Card>> = Arc::new(
            db.list_cards()
                .await?
                .into_iter()
                .map(|card| card.into_api_card())
                .collect(),
        );
        self.store(version, cards.clone());

        Ok(cards)
    }

    /// Version of the cached listing, if any.
    pub fn cached_version(&self) -> Option<u64> {
        self.entry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|entry| entry.version)
    }

    fn lookup(&self, version: u64) -> Option<Arc<Vec<Card>>> {
        let entry = self.entry.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        entry
            .as_ref()
            .filter(|entry| entry.version == version)
            .map(|entry| entry.cards.clone())
    }

    fn store(&self, version: u64, cards: Arc<Vec<Card>>) {
        let mut entry = self.entry.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        // A slower recomputation must not replace a newer listing.
        if entry.as_ref().map_or(true, |current| current.version <= version) {
            *entry = Some(Entry { version, cards });
        }
    }
}
