//! SQLite card store
//!
//! Every mutation runs in its own transaction behind a store-wide write gate
//! and bumps the change counter once committed. Reads go straight to the
//! pool and never wait on the gate.

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use card_core::validation::{self, SHOULD_BE_UNIQUE};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::Mutex;

use crate::error::{ApiError, Result};
use crate::models::*;

/// Database wrapper with connection pool
pub struct Database {
    pool: SqlitePool,
    write_gate: Mutex<()>,
    changes: AtomicU64,
}

impl Database {
    /// Open (creating if needed) the SQLite file at `path`
    pub async fn connect(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        Ok(Self::from_pool(pool))
    }

    fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_gate: Mutex::new(()),
            changes: AtomicU64::new(0),
        }
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ApiError::Migration(e.to_string()))?;
        Ok(())
    }

    /// Number of mutations committed since this store was opened.
    pub fn change_counter(&self) -> u64 {
        self.changes.load(Ordering::SeqCst)
    }

    fn record_change(&self) {
        self.changes.fetch_add(1, Ordering::SeqCst);
    }

    // === Reads ===

    /// All cards in insertion order
    pub async fn list_cards(&self) -> Result<Vec<DbCard>> {
        let cards = sqlx::query_as::<_, DbCard>(
            r#"
            SELECT id, text, translation, image_path, met_at, remembered, active,
                   created_at, updated_at
            FROM cards
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(cards)
    }

    /// Get card by ID
    pub async fn get_card(&self, card_id: i64) -> Result<Option<DbCard>> {
        let mut conn = self.pool.acquire().await?;
        fetch_card(&mut conn, card_id).await
    }

    /// Oldest-met active card with the given `remembered` flag
    pub async fn earliest_active(&self, remembered: bool) -> Result<Option<DbCard>> {
        let card = sqlx::query_as::<_, DbCard>(
            r#"
            SELECT id, text, translation, image_path, met_at, remembered, active,
                   created_at, updated_at
            FROM cards
            WHERE active = 1 AND remembered = ?
            ORDER BY met_at, id
            LIMIT 1
            "#,
        )
        .bind(remembered)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    // === Mutations ===

    /// Validate and insert a new card
    pub async fn create_card(&self, payload: &CardPayload) -> Result<DbCard> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let (text, translation) = validated_fields(&mut tx, payload, None).await?;
        let now = Utc::now();

        let card = sqlx::query_as::<_, DbCard>(
            r#"
            INSERT INTO cards (text, translation, image_path, met_at, remembered, active,
                               created_at, updated_at)
            VALUES (?, ?, NULL, ?, ?, ?, ?, ?)
            RETURNING id, text, translation, image_path, met_at, remembered, active,
                      created_at, updated_at
            "#,
        )
        .bind(text)
        .bind(translation)
        .bind(payload.met_at().unwrap_or(now))
        .bind(payload.remembered().unwrap_or(false))
        .bind(payload.active().unwrap_or(true))
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        tx.commit().await?;
        self.record_change();

        Ok(card)
    }

    /// Validate and apply an update.
    ///
    /// `text` and `translation` are required just as on create; omitted
    /// `met_at`, `remembered` and `active` keep their stored value.
    /// `updated_at` only moves when `text`, `translation` or `active`
    /// actually changes: resubmitting identical values is not an edit.
    /// `remembered` and `met_at` are review bookkeeping and never move it.
    pub async fn update_card(&self, card_id: i64, payload: &CardPayload) -> Result<DbCard> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let existing = fetch_card(&mut tx, card_id)
            .await?
            .ok_or_else(|| card_not_found(card_id))?;

        let (text, translation) = validated_fields(&mut tx, payload, Some(card_id)).await?;
        let active = payload.active().unwrap_or(existing.active);
        let remembered = payload.remembered().unwrap_or(existing.remembered);
        let met_at = payload.met_at().unwrap_or(existing.met_at);

        let significant =
            text != existing.text || translation != existing.translation || active != existing.active;
        let updated_at = if significant {
            touched_at(&existing)
        } else {
            existing.updated_at
        };

        let result = sqlx::query(
            r#"
            UPDATE cards
            SET text = ?, translation = ?, met_at = ?, remembered = ?, active = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(text)
        .bind(translation)
        .bind(met_at)
        .bind(remembered)
        .bind(active)
        .bind(updated_at)
        .bind(card_id)
        .execute(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        expect_one_row(result.rows_affected(), "update", card_id)?;

        let card = fetch_card(&mut tx, card_id)
            .await?
            .ok_or_else(|| ApiError::Store(format!("card {} vanished during update", card_id)))?;

        tx.commit().await?;
        self.record_change();

        Ok(card)
    }

    /// Delete a card together with its files.
    ///
    /// `purge` runs after the row is deleted but before commit, so a purge
    /// failure leaves the card in place. If the commit fails after a
    /// successful purge, the surviving row has its `image_path` cleared.
    pub async fn delete_card<F, Fut>(&self, card_id: i64, purge: F) -> Result<DbCard>
    where
        F: FnOnce(DbCard) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let card = fetch_card(&mut tx, card_id)
            .await?
            .ok_or_else(|| card_not_found(card_id))?;

        let result = sqlx::query("DELETE FROM cards WHERE id = ?")
            .bind(card_id)
            .execute(&mut *tx)
            .await?;
        expect_one_row(result.rows_affected(), "delete", card_id)?;

        purge(card.clone()).await?;

        if let Err(err) = tx.commit().await {
            if card.image_path.is_some() {
                match self.force_clear_image_path(card_id).await {
                    Ok(()) => self.record_change(),
                    Err(e) => tracing::error!(
                        "Card {} still references purged image after failed delete: {}",
                        card_id,
                        e
                    ),
                }
            }
            return Err(err.into());
        }
        self.record_change();

        Ok(card)
    }

    /// Point `image_path` at `image_path` (or clear it) and bump `updated_at`.
    ///
    /// `finalize` runs after the row update and before commit; if it fails
    /// the row change is rolled back.
    pub async fn set_image_path<F, Fut>(
        &self,
        card_id: i64,
        image_path: Option<&str>,
        finalize: F,
    ) -> Result<DbCard>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let existing = fetch_card(&mut tx, card_id)
            .await?
            .ok_or_else(|| card_not_found(card_id))?;

        let result = sqlx::query("UPDATE cards SET image_path = ?, updated_at = ? WHERE id = ?")
            .bind(image_path)
            .bind(touched_at(&existing))
            .bind(card_id)
            .execute(&mut *tx)
            .await?;
        expect_one_row(result.rows_affected(), "image update", card_id)?;

        finalize().await?;

        let card = fetch_card(&mut tx, card_id)
            .await?
            .ok_or_else(|| ApiError::Store(format!("card {} vanished during image update", card_id)))?;

        tx.commit().await?;
        self.record_change();

        Ok(card)
    }

    /// Clear `image_path` if it still equals `expected`.
    ///
    /// Used by reconciliation; returns whether the row was changed.
    pub async fn clear_missing_image(&self, card_id: i64, expected: &str) -> Result<bool> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        let existing = match fetch_card(&mut tx, card_id).await? {
            Some(card) if card.image_path.as_deref() == Some(expected) => card,
            _ => return Ok(false),
        };

        let result = sqlx::query("UPDATE cards SET image_path = NULL, updated_at = ? WHERE id = ?")
            .bind(touched_at(&existing))
            .bind(card_id)
            .execute(&mut *tx)
            .await?;
        expect_one_row(result.rows_affected(), "image reconcile", card_id)?;

        tx.commit().await?;
        self.record_change();

        Ok(true)
    }

    /// Compensation path for a failed delete; caller holds the write gate.
    async fn force_clear_image_path(&self, card_id: i64) -> Result<()> {
        sqlx::query("UPDATE cards SET image_path = NULL, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(card_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

async fn fetch_card(conn: &mut SqliteConnection, card_id: i64) -> Result<Option<DbCard>> {
    let card = sqlx::query_as::<_, DbCard>(
        r#"
        SELECT id, text, translation, image_path, met_at, remembered, active,
               created_at, updated_at
        FROM cards
        WHERE id = ?
        "#,
    )
    .bind(card_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(card)
}

async fn text_taken(conn: &mut SqliteConnection, text: &str, excluding: Option<i64>) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM cards WHERE text = ? AND id != ? LIMIT 1")
        .bind(text)
        .bind(excluding.unwrap_or(-1))
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.is_some())
}

/// Run field validation and hand back the trimmed text and translation.
async fn validated_fields<'p>(
    conn: &mut SqliteConnection,
    payload: &'p CardPayload,
    excluding: Option<i64>,
) -> Result<(&'p str, &'p str)> {
    let taken = match validation::uniqueness_candidate(payload) {
        Some(text) => text_taken(conn, text, excluding).await?,
        None => false,
    };

    let errors = validation::validate(payload, taken);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    match (payload.trimmed_text(), payload.trimmed_translation()) {
        (Some(text), Some(translation)) => Ok((text, translation)),
        _ => Err(ApiError::Store("validated payload is missing text".to_string())),
    }
}

/// `updated_at` for a semantic change, never earlier than the stored value.
fn touched_at(existing: &DbCard) -> DateTime<Utc> {
    Utc::now().max(existing.updated_at)
}

fn expect_one_row(rows: u64, action: &str, card_id: i64) -> Result<()> {
    if rows == 1 {
        Ok(())
    } else {
        Err(ApiError::Store(format!(
            "{} of card {} affected {} rows",
            action, card_id, rows
        )))
    }
}

fn card_not_found(card_id: i64) -> ApiError {
    ApiError::NotFound(format!("Card {} not found", card_id))
}

fn map_unique_violation(err: sqlx::Error) -> ApiError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            ApiError::Validation(FieldErrors::single("text", SHOULD_BE_UNIQUE))
        }
        _ => ApiError::Database(err),
    }
}
