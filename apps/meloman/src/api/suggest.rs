//! Autocomplete endpoints backed by the catalog.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::db::queries;
use crate::error::Result;
use crate::AppState;

/// Maximum number of suggestions returned.
const SUGGEST_LIMIT: u32 = 10;

/// Query parameters for artist suggestions.
#[derive(Debug, Deserialize)]
pub struct ArtistSuggestQuery {
    pub q: Option<String>,
}

/// Query parameters for track suggestions.
#[derive(Debug, Deserialize)]
pub struct TrackSuggestQuery {
    pub q: Option<String>,
    /// Restrict to one artist (exact match, ignoring case).
    pub artist: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// GET /api/suggest/artists?q=
///
/// Catalog artists containing `q`, ignoring case.
pub async fn suggest_artists(
    State(state): State<AppState>,
    Query(query): Query<ArtistSuggestQuery>,
) -> Result<Json<Vec<String>>> {
    let Some(q) = non_blank(&query.q) else {
        return Ok(Json(Vec::new()));
    };

    let db = state.db.lock().await;
    let artists = queries::suggest_artists(&db, q, SUGGEST_LIMIT)?;

    Ok(Json(artists))
}

/// GET /api/suggest/tracks?q=&artist=
///
/// Catalog titles containing `q`, optionally by a given artist.
pub async fn suggest_tracks(
    State(state): State<AppState>,
    Query(query): Query<TrackSuggestQuery>,
) -> Result<Json<Vec<String>>> {
    let Some(q) = non_blank(&query.q) else {
        return Ok(Json(Vec::new()));
    };

    let db = state.db.lock().await;
    let titles = queries::suggest_tracks(&db, q, non_blank(&query.artist), SUGGEST_LIMIT)?;

    Ok(Json(titles))
}
