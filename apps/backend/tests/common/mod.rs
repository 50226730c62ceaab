//! Common test utilities and fixtures for integration tests.
//!
//! This module provides shared test infrastructure including:
//! - TestContext with a scratch SQLite file and image directory
//! - Helper functions for creating test data
//!
//! Everything lives in a temporary directory removed when the context drops,
//! so tests need no external services.

#![allow(dead_code)]

pub mod fixtures;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;

use card_core::selection::{RandomTarget, TargetSource};
use card_reviewer_backend::db::Database;
use card_reviewer_backend::models::{Card, CardPayload};
use card_reviewer_backend::services::archive::ArchiveExporter;
use card_reviewer_backend::services::cards::CardService;
use card_reviewer_backend::services::images::ImageStore;
use card_reviewer_backend::services::picker::SelectionPicker;
use card_reviewer_backend::{build_router, AppState};

const DB_FILE: &str = "db.sqlite";

/// Test context containing the card service and a router over it.
pub struct TestContext {
    pub cards: Arc<CardService>,
    pub db: Arc<Database>,
    app: Router,
    dir: TempDir,
}

impl TestContext {
    /// Create a context whose picker draws from a fair coin.
    pub async fn new() -> Self {
        Self::with_target(Arc::new(RandomTarget)).await
    }

    /// Create a context with a specific picker target source.
    ///
    /// # Panics
    /// Panics if the scratch directory or database cannot be set up.
    pub async fn with_target(target: Arc<dyn TargetSource>) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create scratch directory");

        let db = Database::connect(&dir.path().join(DB_FILE))
            .await
            .expect("Failed to open test database");
        db.run_migrations().await.expect("Failed to run migrations");
        let db = Arc::new(db);

        let images = ImageStore::new(dir.path().join("images"));
        images
            .ensure_dir()
            .await
            .expect("Failed to create image directory");

        let archive = ArchiveExporter::new(dir.path().join("images"), dir.path());
        let cards = Arc::new(CardService::new(
            db.clone(),
            images,
            archive,
            SelectionPicker::new(target),
        ));

        let app = build_router(AppState {
            cards: cards.clone(),
            max_upload_bytes: 1024 * 1024,
        });

        Self {
            cards,
            db,
            app,
            dir,
        }
    }

    /// Get the router for use with axum-test.
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub fn server(&self) -> TestServer {
        TestServer::new(self.router()).expect("Failed to start test server")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.dir.path().join("images")
    }

    /// Sorted names of everything in the image directory.
    pub fn image_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.images_dir())
            .expect("Failed to list image directory")
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Run raw SQL against the database file over a separate connection.
    pub async fn execute_sql(&self, statements: &[&str]) {
        let options = SqliteConnectOptions::new().filename(self.dir.path().join(DB_FILE));
        let pool = SqlitePool::connect_with(options)
            .await
            .expect("Failed to open side connection");
        for statement in statements {
            sqlx::query(*statement)
                .execute(&pool)
                .await
                .expect("Failed to execute SQL");
        }
        pool.close().await;
    }

    /// Drop a file straight into the image directory.
    pub fn put_image_file(&self, name: &str, contents: &[u8]) {
        std::fs::write(self.images_dir().join(name), contents).expect("Failed to write image file");
    }

    /// Create a card through the service.
    pub async fn create_card(&self, text: &str, translation: &str) -> Card {
        self.cards
            .create_card(&CardPayload::new(text, translation))
            .await
            .expect("Failed to create test card")
    }

    /// Create a card with explicit review state.
    pub async fn create_card_with(
        &self,
        text: &str,
        met_at: &str,
        remembered: bool,
        active: bool,
    ) -> Card {
        let payload = CardPayload::new(text, format!("{} translated", text))
            .with_met_at(met_at)
            .with_remembered(remembered)
            .with_active(active);
        self.cards
            .create_card(&payload)
            .await
            .expect("Failed to create test card")
    }
}
