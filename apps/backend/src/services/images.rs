//! Card image files, kept in lockstep with the `image_path` column.
//!
//! Images live flat in one directory as `card_<id>.<ext>`. Uploads are first
//! written to a staging file `.card_<id>.upload.tmp` and only renamed into
//! place inside the database transaction that records them, so a failed row
//! update never leaves a new file behind. When the upload replaces the very
//! file the row names, that file is copied to `.card_<id>.prev` first and
//! put back if the transaction fails.
//!
//! Methods that mutate a card expect the caller to hold that card's lock
//! (see [`crate::services::locks::CardLocks`]).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::db::Database;
use crate::error::{ApiError, Result};
use crate::models::{DbCard, ImageUpload, ReconcileReport};
use crate::services::locks::CardLocks;

const FILE_PREFIX: &str = "card_";
const STAGING_SUFFIX: &str = ".upload.tmp";
const BACKUP_SUFFIX: &str = ".prev";
const MAX_EXTENSION_LEN: usize = 10;

/// Image directory manager.
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the image directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ApiError::storage(format!("creating {}", self.dir.display()), e))
    }

    /// Stored file name for a card image.
    pub fn file_name(card_id: i64, extension: &str) -> String {
        format!("{}{}.{}", FILE_PREFIX, card_id, extension)
    }

    fn staging_path(&self, card_id: i64) -> PathBuf {
        self.dir
            .join(format!(".{}{}{}", FILE_PREFIX, card_id, STAGING_SUFFIX))
    }

    fn backup_path(&self, card_id: i64) -> PathBuf {
        self.dir
            .join(format!(".{}{}{}", FILE_PREFIX, card_id, BACKUP_SUFFIX))
    }

    /// Store an uploaded image for a card and point `image_path` at it.
    ///
    /// Any other `card_<id>.*` file (an earlier upload in another format) is
    /// removed once the new file is committed.
    pub async fn set_image(
        &self,
        db: &Database,
        card_id: i64,
        upload: Option<&ImageUpload>,
    ) -> Result<DbCard> {
        let current = db
            .get_card(card_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Card {} not found", card_id)))?;

        let upload = upload.ok_or_else(|| ApiError::BadRequest("missing image upload".to_string()))?;
        let extension = upload_extension(upload)?;
        if upload.bytes.is_empty() {
            return Err(ApiError::BadRequest("image upload is empty".to_string()));
        }

        let name = Self::file_name(card_id, &extension);
        let target = self.dir.join(&name);
        let staging = self.staging_path(card_id);
        let backup = self.backup_path(card_id);

        tokio::fs::write(&staging, &upload.bytes)
            .await
            .map_err(|e| ApiError::storage(format!("writing {}", staging.display()), e))?;

        let backed_up = if current.image_path.as_deref() == Some(name.as_str()) {
            match tokio::fs::copy(&target, &backup).await {
                Ok(_) => true,
                Err(e) if e.kind() == ErrorKind::NotFound => false,
                Err(e) => {
                    discard(&staging).await;
                    return Err(ApiError::storage(format!("backing up {}", name), e));
                }
            }
        } else {
            false
        };

        let (staging_ref, target_ref, name_ref) = (&staging, &target, name.as_str());
        let committed = db
            .set_image_path(card_id, Some(name_ref), move || async move {
                tokio::fs::rename(staging_ref, target_ref)
                    .await
                    .map_err(|e| ApiError::storage(format!("moving upload to {}", name_ref), e))
            })
            .await;

        let card = match committed {
            Ok(card) => card,
            Err(err) => {
                discard(&staging).await;
                if backed_up {
                    restore(&backup, &target).await;
                } else {
                    discard(&target).await;
                }
                return Err(err);
            }
        };
        if backed_up {
            discard(&backup).await;
        }

        let replaced = self.remove_card_files_except(card_id, Some(&name)).await?;
        tracing::info!(
            "Stored image {} for card {} (removed {:?})",
            name,
            card_id,
            replaced
        );

        Ok(card)
    }

    /// Drop a card's image: clear `image_path`, then delete its files.
    pub async fn clear_image(&self, db: &Database, card_id: i64) -> Result<DbCard> {
        let current = db
            .get_card(card_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Card {} not found", card_id)))?;
        if current.image_path.is_none() {
            return Err(ApiError::NotFound(format!("Card {} has no image", card_id)));
        }

        let card = db.set_image_path(card_id, None, || async { Ok(()) }).await?;
        let removed = self.remove_card_files(card_id).await?;
        tracing::info!("Cleared image of card {} (removed {:?})", card_id, removed);

        Ok(card)
    }

    /// Delete every `card_<id>.*` file. Returns the names removed.
    pub async fn remove_card_files(&self, card_id: i64) -> Result<Vec<String>> {
        self.remove_card_files_except(card_id, None).await
    }

    async fn remove_card_files_except(&self, card_id: i64, keep: Option<&str>) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for name in self.card_files(card_id).await? {
            if Some(name.as_str()) == keep {
                continue;
            }
            if remove_if_exists(&self.dir.join(&name)).await? {
                removed.push(name);
            }
        }
        Ok(removed)
    }

    /// Names of the `card_<id>.*` files currently on disk.
    pub async fn card_files(&self, card_id: i64) -> Result<Vec<String>> {
        Ok(self
            .file_names()
            .await?
            .into_iter()
            .filter(|name| matches!(parse_file_name(name), Some((id, _)) if id == card_id))
            .collect())
    }

    /// Bring files and `image_path` values back in line.
    ///
    /// Deletes image files (and stale staging or backup files) that their card does
    /// not reference, and clears `image_path` on cards whose file is gone.
    /// Each card is handled under its lock so this can run alongside
    /// requests.
    pub async fn reconcile(&self, db: &Database, locks: &CardLocks) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for name in self.file_names().await? {
            let card_id = match parse_file_name(&name)
                .map(|(id, _)| id)
                .or_else(|| parse_scratch_name(&name))
            {
                Some(id) => id,
                None => continue,
            };

            let _guard = locks.lock(card_id).await;
            let referenced = db.get_card(card_id).await?.and_then(|card| card.image_path);
            if referenced.as_deref() == Some(name.as_str()) {
                continue;
            }
            if remove_if_exists(&self.dir.join(&name)).await? {
                tracing::info!("Removed orphan image {}", name);
                report.removed_files.push(name);
            }
        }

        for card in db.list_cards().await? {
            let Some(path) = card.image_path.as_deref() else {
                continue;
            };

            let _guard = locks.lock(card.id).await;
            let exists = tokio::fs::try_exists(self.dir.join(path))
                .await
                .map_err(|e| ApiError::storage(format!("checking {}", path), e))?;
            if exists {
                continue;
            }
            if db.clear_missing_image(card.id, path).await? {
                tracing::warn!("Card {} referenced missing image {}", card.id, path);
                report.cleared_cards.push(card.id);
            }
        }

        Ok(report)
    }

    /// Regular files directly inside the image directory, sorted.
    async fn file_names(&self) -> Result<Vec<String>> {
        let listing_err = |e: std::io::Error| ApiError::storage(format!("listing {}", self.dir.display()), e);

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(listing_err(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(listing_err)? {
            if !entry.file_type().await.map_err(listing_err)?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();

        Ok(names)
    }
}

/// Split `card_<id>.<ext>` into its id and extension.
pub fn parse_file_name(name: &str) -> Option<(i64, &str)> {
    let (id, extension) = name.strip_prefix(FILE_PREFIX)?.split_once('.')?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) || extension.is_empty() {
        return None;
    }
    Some((id.parse().ok()?, extension))
}

/// Card id of a `.card_<id>.upload.tmp` or `.card_<id>.prev` file.
fn parse_scratch_name(name: &str) -> Option<i64> {
    let rest = name.strip_prefix('.')?.strip_prefix(FILE_PREFIX)?;
    let id = rest
        .strip_suffix(STAGING_SUFFIX)
        .or_else(|| rest.strip_suffix(BACKUP_SUFFIX))?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse().ok()
}

/// Extension to store an upload under.
///
/// Taken from the client file name, falling back to the content-type
/// subtype (`image/svg+xml` gives `svg`). The content type itself must be
/// `image/*`.
pub fn upload_extension(upload: &ImageUpload) -> Result<String> {
    let content_type = upload
        .content_type
        .as_deref()
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| ct.starts_with("image/"))
        .ok_or_else(|| ApiError::BadRequest("upload content type must be image/*".to_string()))?;

    let from_name = upload
        .file_name
        .as_deref()
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| is_valid_extension(ext));

    let from_type = content_type["image/".len()..]
        .split(|c| c == '+' || c == ';')
        .next()
        .map(|subtype| subtype.trim().to_string())
        .filter(|ext| is_valid_extension(ext));

    from_name
        .or(from_type)
        .ok_or_else(|| ApiError::BadRequest("cannot determine image file extension".to_string()))
}

fn is_valid_extension(ext: &str) -> bool {
    !ext.is_empty() && ext.len() <= MAX_EXTENSION_LEN && ext.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Remove a file; an already missing file is not an error.
async fn remove_if_exists(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ApiError::storage(format!("removing {}", path.display()), e)),
    }
}

/// Put a backed-up file back in place on a rollback path.
async fn restore(backup: &Path, target: &Path) {
    if let Err(e) = tokio::fs::rename(backup, target).await {
        tracing::error!(
            "Rollback could not restore {} from {}: {}",
            target.display(),
            backup.display(),
            e
        );
    }
}

/// Best-effort removal on a rollback path, where the original error wins.
async fn discard(path: &Path) {
    if let Err(e) = remove_if_exists(path).await {
        tracing::warn!("Rollback could not remove {}: {}", path.display(), e);
    }
}
