pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::services::archive::ArchiveExporter;
use crate::services::cards::CardService;
use crate::services::images::ImageStore;
use crate::services::picker::SelectionPicker;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub cards: Arc<CardService>,
    pub max_upload_bytes: usize,
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tokio::fs::create_dir_all(&config.storage_dir).await?;
    if let Some(parent) = config.database_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    tracing::info!("Opening database at {}...", config.database_path.display());
    let db = Database::connect(&config.database_path).await?;

    tracing::info!("Running migrations...");
    db.run_migrations().await?;

    let images = ImageStore::new(&config.images_dir);
    images.ensure_dir().await?;

    let archive = ArchiveExporter::new(&config.images_dir, &config.storage_dir);
    let cards = Arc::new(CardService::new(
        Arc::new(db),
        images,
        archive,
        SelectionPicker::default(),
    ));

    tracing::info!("Reconciling images in {}...", config.images_dir.display());
    let report = cards.reconcile_images().await?;
    tracing::info!(
        "Removed {} orphan files, cleared {} dangling image paths",
        report.removed_files.len(),
        report.cleared_cards.len()
    );

    if let Some(every) = config.reconcile_interval {
        spawn_reconciler(cards.clone(), every);
    }

    let state = AppState {
        cards,
        max_upload_bytes: config.max_upload_bytes,
    };

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr = config.bind_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/api/cards",
            get(routes::cards::list).post(routes::cards::create),
        )
        .route("/api/cards/next", get(routes::cards::next))
        .route(
            "/api/cards/:id",
            get(routes::cards::get)
                .put(routes::cards::update)
                .delete(routes::cards::delete),
        )
        .route(
            "/api/cards/:id/image",
            put(routes::images::upload).delete(routes::images::clear),
        )
        .route("/api/storage/export", get(routes::storage::export))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes));

    Router::new()
        .route("/health", get(health_check))
        .merge(api)
        .with_state(state)
}

fn spawn_reconciler(cards: Arc<CardService>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately; startup already reconciled.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match cards.reconcile_images().await {
                Ok(report) if report.is_clean() => tracing::debug!("Images consistent"),
                Ok(report) => tracing::info!(
                    "Reconciled images: removed {:?}, cleared cards {:?}",
                    report.removed_files,
                    report.cleared_cards
                ),
                Err(e) => tracing::error!("Image reconciliation failed: {}", e),
            }
        }
    });
}

async fn health_check() -> &'static str {
    "OK"
}
