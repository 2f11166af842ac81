//! Router assembly and the shared application state.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{delete, get, post};
use axum::{middleware, Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use invoica_store::Database;

use crate::blob_store::BlobStore;
use crate::clover::CloverService;
use crate::config::ServerConfig;
use crate::notify::{Mailer, Texter};
use crate::pdf::PdfRenderer;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::routes;

/// SQLite handle shared across handlers. rusqlite connections are not
/// `Sync`, so access is serialized behind an async mutex.
pub type Store = Arc<tokio::sync::Mutex<Database>>;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Arc<ServerConfig>,
    pub blob_store: Arc<BlobStore>,
    pub clover: Arc<CloverService>,
    pub mailer: Arc<Mailer>,
    pub texter: Arc<Texter>,
    pub rate_limiter: RateLimiter,
    pub pdf: Arc<PdfRenderer>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    // Image uploads are the largest accepted bodies; leave room for the
    // multipart framing around them.
    let body_limit = state.config.max_image_size + 64 * 1024;

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/forgot-password", post(routes::auth::forgot_password))
        .route("/auth/reset-password", post(routes::auth::reset_password))
        .route(
            "/customers",
            get(routes::customers::list).post(routes::customers::create),
        )
        .route(
            "/customers/{id}",
            get(routes::customers::get)
                .put(routes::customers::update)
                .delete(routes::customers::delete),
        )
        .route(
            "/invoices",
            get(routes::invoices::list).post(routes::invoices::create),
        )
        .route(
            "/invoices/{id}",
            get(routes::invoices::get)
                .put(routes::invoices::update)
                .delete(routes::invoices::delete),
        )
        .route("/invoices/{id}/status", post(routes::invoices::set_status))
        .route("/invoices/{id}/pdf", get(routes::invoices::download_pdf))
        .route("/invoices/{id}/send", post(routes::invoices::send))
        .route(
            "/profile",
            get(routes::profile::get).put(routes::profile::update),
        )
        .route("/profile/logo", post(routes::profile::upload_logo))
        .route("/profile/signature", post(routes::profile::upload_signature))
        .route("/blobs/{id}", get(routes::profile::get_blob))
        .route("/clover/connect", get(routes::clover::connect))
        .route("/clover/callback", get(routes::clover::callback))
        .route("/clover/status", get(routes::clover::status))
        .route(
            "/clover/payment-link/{invoice_id}",
            post(routes::clover::payment_link),
        )
        .route("/clover/disconnect", delete(routes::clover::disconnect))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
