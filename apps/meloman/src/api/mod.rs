//! JSON endpoints for Meloman.

use axum::{routing::get, Router};

use crate::AppState;

pub mod suggest;

/// Routes nested under `/api`. Callers add the auth layer.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/suggest/artists", get(suggest::suggest_artists))
        .route("/suggest/tracks", get(suggest::suggest_tracks))
}
