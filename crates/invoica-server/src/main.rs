//! # invoica-server
//!
//! REST backend for the Invoica invoicing service.
//!
//! This binary provides:
//! - **JWT-authenticated REST API** (axum) for users, customers, and invoices
//! - **SQLite persistence** with tenant-scoped queries
//! - **Invoice PDF rendering** through headless Chromium
//! - **Clover OAuth integration** for hosted payment links
//! - **Email/SMS delivery** of invoices via SendGrid and Twilio
//! - **Per-IP rate limiting** to protect against abuse

mod api;
mod auth;
mod blob_store;
mod clover;
mod config;
mod error;
mod notify;
mod pdf;
mod rate_limit;
mod routes;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use invoica_store::Database;

use crate::api::{AppState, Store};
use crate::blob_store::BlobStore;
use crate::clover::{CloverHttpClient, CloverService};
use crate::config::ServerConfig;
use crate::notify::{Mailer, Texter};
use crate::pdf::PdfRenderer;
use crate::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,invoica_server=debug")),
        )
        .init();

    info!("Starting Invoica server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        addr = %config.http_addr,
        clover = config.clover_enabled(),
        email = config.sendgrid_api_key.is_some(),
        sms = config.twilio_account_sid.is_some(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // SQLite database (explicit path or the platform data directory)
    let database = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    if let Some(path) = database.path() {
        info!(path = %path.display(), "Database opened");
    }
    let store: Store = Arc::new(tokio::sync::Mutex::new(database));

    // Upload store for logo/signature images (creates directory if missing)
    let blob_store = Arc::new(BlobStore::new(config.upload_path.clone(), config.max_image_size).await?);

    let config = Arc::new(config);

    // Clover payment integration behind its HTTP client
    let clover = Arc::new(CloverService::new(
        Arc::new(CloverHttpClient::new(config.clone())),
        store.clone(),
        config.clone(),
    ));

    // Outbound notification channels (no-ops when unconfigured)
    let mailer = Arc::new(Mailer::new(&config));
    let texter = Arc::new(Texter::new(&config));

    // Rate limiter: 10 req/s sustained, burst of 30
    let rate_limiter = RateLimiter::default();

    // Bounded PDF renderer (each render launches a Chromium instance)
    let pdf = Arc::new(PdfRenderer::new(config.max_concurrent_renders));

    let http_addr = config.http_addr;
    let app_state = AppState {
        store,
        blob_store,
        clover,
        mailer,
        texter,
        rate_limiter: rate_limiter.clone(),
        pdf,
        config,
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.purge_stale(600.0).await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
