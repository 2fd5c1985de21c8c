//! Meloman library
//!
//! A small music-tracking web application: personal track lists, a shared
//! catalog, "lucky" suggestions and playlists. This library exposes modules
//! for the server binary, the catalog import tool and integration tests.

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_mw,
    response::Json,
    routing::get,
    Router,
};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{services::ServeDir, trace::TraceLayer};

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod services;
pub mod static_files;
pub mod views;

use config::Config;
use services::{AuthService, CoverStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<Mutex<Connection>>,
    pub auth_service: Arc<AuthService>,
    pub covers: Arc<CoverStore>,
}

impl AppState {
    pub fn new(config: Config, conn: Connection, auth_service: AuthService) -> Self {
        let covers = CoverStore::new(config.uploads.dir.clone(), config.uploads.max_cover_bytes);
        Self {
            config: Arc::new(config),
            db: Arc::new(Mutex::new(conn)),
            auth_service: Arc::new(auth_service),
            covers: Arc::new(covers),
        }
    }

    /// Get a reference to the auth service.
    pub fn auth_service(&self) -> &AuthService {
        &self.auth_service
    }

    /// Get a reference to the cover store.
    pub fn covers(&self) -> &CoverStore {
        &self.covers
    }
}

#[derive(Serialize)]
pub struct ApiResponse {
    pub message: String,
    pub version: String,
}

pub async fn health_check() -> Json<ApiResponse> {
    Json(ApiResponse {
        message: "Meloman is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Build the complete application router.
pub fn router(state: AppState) -> Router {
    // Multipart overhead on top of the largest accepted cover
    let body_limit = state.config.uploads.max_cover_bytes + 64 * 1024;

    let api_routes = api::routes().layer(axum_mw::from_fn_with_state(
        state.clone(),
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(health_check))
        .route("/static/*path", get(static_files::serve_static))
        .nest_service("/uploads", ServeDir::new(state.covers().root()))
        .nest("/api", api_routes)
        .merge(views::routes(state.clone()))
        .fallback(views::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
