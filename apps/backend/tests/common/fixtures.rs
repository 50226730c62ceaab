//! Test fixtures and factory functions for creating test data.

use axum_test::multipart::{MultipartForm, Part};
use serde_json::json;

use card_reviewer_backend::models::ImageUpload;

/// A few bytes standing in for image data; content is never inspected.
pub const IMAGE_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot really a png";

/// Schema additions that make the commit of any image change fail.
///
/// The trigger records a row violating a deferred foreign key, which SQLite
/// only checks at COMMIT, after the statement and any file work succeeded.
pub const FAIL_IMAGE_COMMITS: &[&str] = &[
    "CREATE TABLE commit_guard (card_id INTEGER REFERENCES cards(id) DEFERRABLE INITIALLY DEFERRED)",
    "CREATE TRIGGER commit_guard_image AFTER UPDATE OF image_path ON cards \
     BEGIN INSERT INTO commit_guard VALUES (-1); END",
];

/// Same as [`FAIL_IMAGE_COMMITS`], for card deletes.
pub const FAIL_DELETE_COMMITS: &[&str] = &[
    "CREATE TABLE commit_guard (card_id INTEGER REFERENCES cards(id) DEFERRABLE INITIALLY DEFERRED)",
    "CREATE TRIGGER commit_guard_delete AFTER DELETE ON cards \
     BEGIN INSERT INTO commit_guard VALUES (-1); END",
];

/// Upload with a file name and content type.
pub fn image_upload(file_name: &str, content_type: &str) -> ImageUpload {
    ImageUpload::new(file_name, content_type, IMAGE_BYTES.to_vec())
}

/// Create a card request body.
pub fn card_request(text: &str, translation: &str) -> serde_json::Value {
    json!({ "text": text, "translation": translation })
}

/// Multipart form carrying an image in the `image` field.
pub fn image_form(file_name: &str, content_type: &str) -> MultipartForm {
    let part = Part::bytes(IMAGE_BYTES.to_vec())
        .file_name(file_name)
        .mime_type(content_type);
    MultipartForm::new().add_part("image", part)
}
