//! Personal track list

use askama::Template;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    Extension, Form,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::db::models::Track;
use crate::db::queries::{self, Insert};
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::catalog;
use crate::AppState;

use super::flash::{self, Flash};
use super::utils::{non_empty, FormErrors};
use super::{Layout, PagePath, PageResult};

const FIELD_MAX: usize = 255;

#[derive(Template)]
#[template(path = "pages/songs.html")]
pub struct SongsTemplate {
    pub layout: Layout,
    pub tracks: Vec<Track>,
    pub artist_filter: String,
    pub title: String,
    pub artist: String,
    pub errors: FormErrors,
}

#[derive(Debug, Deserialize)]
pub struct SongsQuery {
    pub artist: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddSongForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
}

/// List the user's tracks
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<SongsQuery>,
    jar: CookieJar,
) -> PageResult {
    let artist_filter = query.artist.as_deref().and_then(non_empty);

    let tracks = {
        let db = state.db.lock().await;
        queries::list_tracks(&db, user.id, artist_filter.as_deref())?
    };

    let (jar, flash) = flash::take(jar);
    Ok((
        jar,
        SongsTemplate {
            layout: Layout::new(Some(&user), flash, "songs"),
            tracks,
            artist_filter: artist_filter.unwrap_or_default(),
            title: String::new(),
            artist: String::new(),
            errors: FormErrors::default(),
        },
    )
        .into_response())
}

/// Add a track to the user's list
pub async fn add(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
    Form(form): Form<AddSongForm>,
) -> PageResult {
    let (title, artist) = (form.title.trim(), form.artist.trim());

    let mut errors = FormErrors::default();
    errors.check_length("title", title, 1, FIELD_MAX);
    errors.check_length("artist", artist, 1, FIELD_MAX);

    let db = state.db.lock().await;

    if !errors.is_empty() {
        let tracks = queries::list_tracks(&db, user.id, None)?;
        return Ok(SongsTemplate {
            layout: Layout::new(Some(&user), None, "songs"),
            tracks,
            artist_filter: String::new(),
            title: title.to_string(),
            artist: artist.to_string(),
            errors,
        }
        .into_response());
    }

    let (title, artist) = catalog::normalize(&db, title, artist)?;
    let flash = match queries::insert_track(&db, user.id, &title, &artist)? {
        Insert::Created(track_id) => {
            tracing::info!(user_id = user.id, track_id, "Track added");
            Flash::success(format!("Added \"{}\" by {}", title, artist))
        }
        Insert::Duplicate => {
            Flash::warning(format!("\"{}\" by {} is already in your list", title, artist))
        }
    };

    Ok((flash::push(jar, flash), Redirect::to("/songs")).into_response())
}

/// Delete one of the user's tracks
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    PagePath(track_id): PagePath<i64>,
    jar: CookieJar,
) -> PageResult {
    let deleted = {
        let db = state.db.lock().await;
        queries::delete_track(&db, user.id, track_id)?
    };

    if !deleted {
        return Err(AppError::NotFound(format!("/songs/{}", track_id)).into());
    }

    tracing::info!(user_id = user.id, track_id, "Track deleted");
    let jar = flash::push(jar, Flash::info("Track deleted"));
    Ok((jar, Redirect::to("/songs")).into_response())
}
