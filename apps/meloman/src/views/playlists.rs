//! Playlist pages: listing, create/edit with cover upload, track membership.

use askama::Template;
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Extension, Form,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::db::models::{Playlist, PlaylistSummary, Track};
use crate::db::queries::{self, Insert, PlaylistFields};
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::covers::CoverError;
use crate::AppState;

use super::flash::{self, Flash};
use super::utils::{format_date, non_empty, FormErrors};
use super::{Layout, PageError, PagePath, PageResult};

const TITLE_MAX: usize = 255;
const DESCRIPTION_MAX: usize = 2000;

#[derive(Template)]
#[template(path = "pages/playlists.html")]
pub struct PlaylistsTemplate {
    pub layout: Layout,
    pub playlists: Vec<PlaylistSummary>,
}

#[derive(Template)]
#[template(path = "pages/playlist_form.html")]
pub struct PlaylistFormTemplate {
    pub layout: Layout,
    /// Form target, `/playlists/new` or `/playlists/:id/edit`
    pub action: String,
    pub editing: bool,
    pub title: String,
    pub description: String,
    pub cover: Option<String>,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "pages/playlist_detail.html")]
pub struct PlaylistDetailTemplate {
    pub layout: Layout,
    pub playlist: Playlist,
    pub created: String,
    pub tracks: Vec<Track>,
    pub addable: Vec<Track>,
}

#[derive(Debug, Deserialize)]
pub struct AddTrackForm {
    /// Kept as text so a missing or mangled value gets the 404 page
    pub track_id: Option<String>,
}

impl AddTrackForm {
    fn track_id(&self) -> Option<i64> {
        self.track_id.as_deref()?.trim().parse().ok()
    }
}

/// An uploaded file taken from the multipart body.
struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

/// Parsed create/edit form.
#[derive(Default)]
struct PlaylistForm {
    title: String,
    description: String,
    cover: Option<Upload>,
    remove_cover: bool,
    /// The body hit the request limit while reading the cover
    cover_too_large: bool,
}

impl PlaylistForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, PageError> {
        let mut form = PlaylistForm::default();

        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(err) if is_too_large(&err) => {
                    form.cover_too_large = true;
                    break;
                }
                Err(err) => return Err(bad_multipart(err)),
            };
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "title" => form.title = field.text().await.map_err(bad_multipart)?,
                "description" => form.description = field.text().await.map_err(bad_multipart)?,
                "remove_cover" => {
                    let value = field.text().await.map_err(bad_multipart)?;
                    form.remove_cover = matches!(value.as_str(), "on" | "true" | "1");
                }
                "cover" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let bytes = match field.bytes().await {
                        Ok(bytes) => bytes,
                        Err(err) if is_too_large(&err) => {
                            form.cover_too_large = true;
                            break;
                        }
                        Err(err) => return Err(bad_multipart(err)),
                    };
                    // Browsers send an empty part when no file was chosen
                    if !file_name.is_empty() && !bytes.is_empty() {
                        form.cover = Some(Upload {
                            file_name,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                other => tracing::debug!(field = other, "Ignoring unknown playlist form field"),
            }
        }

        form.title = form.title.trim().to_string();
        Ok(form)
    }

    fn validate(&self, max_cover_bytes: usize) -> FormErrors {
        let mut errors = FormErrors::default();
        errors.check_length("title", &self.title, 1, TITLE_MAX);
        errors.check_length("description", self.description.trim(), 0, DESCRIPTION_MAX);
        if self.cover_too_large {
            errors.add("cover", CoverError::TooLarge { max: max_cover_bytes }.to_string());
        }
        errors
    }
}

fn is_too_large(err: &MultipartError) -> bool {
    err.status() == StatusCode::PAYLOAD_TOO_LARGE
}

fn bad_multipart(err: MultipartError) -> PageError {
    AppError::BadRequest(format!("Invalid form data: {}", err)).into()
}

fn not_found(playlist_id: i64) -> PageError {
    AppError::NotFound(format!("/playlists/{}", playlist_id)).into()
}

/// Saves the uploaded cover, recording a form error when it is rejected.
async fn store_cover(
    state: &AppState,
    upload: Option<&Upload>,
    errors: &mut FormErrors,
) -> Option<String> {
    let upload = upload?;
    match state.covers().save(&upload.file_name, &upload.bytes).await {
        Ok(path) => Some(path),
        Err(err) => {
            tracing::debug!(error = %err, "Rejected playlist cover");
            errors.add("cover", err.to_string());
            None
        }
    }
}

/// Deletes a freshly stored cover when the row that would own it was not written.
async fn discard_cover<T>(
    state: &AppState,
    cover: Option<&str>,
    result: Result<T, rusqlite::Error>,
) -> Result<T, PageError> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => {
            if let Some(cover) = cover {
                tracing::warn!(cover, "Removing cover of unsaved playlist");
                state.covers().remove(cover).await;
            }
            Err(err.into())
        }
    }
}

/// List the user's playlists
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> PageResult {
    let playlists = {
        let db = state.db.lock().await;
        queries::list_playlists(&db, user.id)?
    };

    let (jar, flash) = flash::take(jar);
    Ok((
        jar,
        PlaylistsTemplate {
            layout: Layout::new(Some(&user), flash, "playlists"),
            playlists,
        },
    )
        .into_response())
}

/// Empty playlist form
pub async fn new_page(Extension(user): Extension<CurrentUser>, jar: CookieJar) -> PageResult {
    let (jar, flash) = flash::take(jar);
    Ok((
        jar,
        PlaylistFormTemplate {
            layout: Layout::new(Some(&user), flash, "playlists"),
            action: "/playlists/new".to_string(),
            editing: false,
            title: String::new(),
            description: String::new(),
            cover: None,
            errors: FormErrors::default(),
        },
    )
        .into_response())
}

/// Create a playlist
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
    multipart: Multipart,
) -> PageResult {
    let form = PlaylistForm::from_multipart(multipart).await?;
    let mut errors = form.validate(state.covers().max_bytes());

    let cover = if errors.is_empty() {
        store_cover(&state, form.cover.as_ref(), &mut errors).await
    } else {
        None
    };

    if !errors.is_empty() {
        return Ok(PlaylistFormTemplate {
            layout: Layout::new(Some(&user), None, "playlists"),
            action: "/playlists/new".to_string(),
            editing: false,
            title: form.title,
            description: form.description,
            cover: None,
            errors,
        }
        .into_response());
    }

    let fields = PlaylistFields {
        title: form.title,
        description: non_empty(&form.description),
        cover,
    };

    let inserted = {
        let db = state.db.lock().await;
        queries::insert_playlist(&db, user.id, &fields)
    };
    let playlist_id = discard_cover(&state, fields.cover.as_deref(), inserted).await?;

    tracing::info!(user_id = user.id, playlist_id, "Playlist created");
    let jar = flash::push(jar, Flash::success(format!("Playlist \"{}\" created", fields.title)));
    Ok((jar, Redirect::to(&format!("/playlists/{}", playlist_id))).into_response())
}

/// Playlist with its tracks and the add-track form
pub async fn detail(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    PagePath(playlist_id): PagePath<i64>,
    jar: CookieJar,
) -> PageResult {
    let (playlist, tracks, addable) = {
        let db = state.db.lock().await;
        let playlist = queries::find_playlist(&db, user.id, playlist_id)?
            .ok_or_else(|| not_found(playlist_id))?;
        let tracks = queries::playlist_tracks(&db, playlist_id)?;
        let addable = queries::addable_tracks(&db, user.id, playlist_id)?;
        (playlist, tracks, addable)
    };

    let (jar, flash) = flash::take(jar);
    Ok((
        jar,
        PlaylistDetailTemplate {
            layout: Layout::new(Some(&user), flash, "playlists"),
            created: format_date(&playlist.created_at),
            playlist,
            tracks,
            addable,
        },
    )
        .into_response())
}

/// Pre-filled playlist form
pub async fn edit_page(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    PagePath(playlist_id): PagePath<i64>,
    jar: CookieJar,
) -> PageResult {
    let playlist = {
        let db = state.db.lock().await;
        queries::find_playlist(&db, user.id, playlist_id)?.ok_or_else(|| not_found(playlist_id))?
    };

    let (jar, flash) = flash::take(jar);
    Ok((
        jar,
        PlaylistFormTemplate {
            layout: Layout::new(Some(&user), flash, "playlists"),
            action: format!("/playlists/{}/edit", playlist_id),
            editing: true,
            title: playlist.title,
            description: playlist.description.unwrap_or_default(),
            cover: playlist.cover,
            errors: FormErrors::default(),
        },
    )
        .into_response())
}

/// Update title, description and cover
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    PagePath(playlist_id): PagePath<i64>,
    jar: CookieJar,
    multipart: Multipart,
) -> PageResult {
    let existing = {
        let db = state.db.lock().await;
        queries::find_playlist(&db, user.id, playlist_id)?.ok_or_else(|| not_found(playlist_id))?
    };

    let form = PlaylistForm::from_multipart(multipart).await?;
    let mut errors = form.validate(state.covers().max_bytes());

    let new_cover = if errors.is_empty() {
        store_cover(&state, form.cover.as_ref(), &mut errors).await
    } else {
        None
    };

    if !errors.is_empty() {
        return Ok(PlaylistFormTemplate {
            layout: Layout::new(Some(&user), None, "playlists"),
            action: format!("/playlists/{}/edit", playlist_id),
            editing: true,
            title: form.title,
            description: form.description,
            cover: existing.cover,
            errors,
        }
        .into_response());
    }

    // A new upload wins over "remove cover"
    let cover = match new_cover.clone() {
        Some(path) => Some(path),
        None if form.remove_cover => None,
        None => existing.cover.clone(),
    };

    let fields = PlaylistFields {
        title: form.title,
        description: non_empty(&form.description),
        cover,
    };

    let updated = {
        let db = state.db.lock().await;
        queries::update_playlist(&db, user.id, playlist_id, &fields)
    };
    if !discard_cover(&state, new_cover.as_deref(), updated).await? {
        // Deleted between the lookup and the update
        if let Some(cover) = new_cover.as_deref() {
            state.covers().remove(cover).await;
        }
        return Err(not_found(playlist_id));
    }

    if let Some(old) = existing.cover.as_deref() {
        if fields.cover.as_deref() != Some(old) {
            state.covers().remove(old).await;
        }
    }

    tracing::info!(user_id = user.id, playlist_id, "Playlist updated");
    let jar = flash::push(jar, Flash::success("Playlist updated"));
    Ok((jar, Redirect::to(&format!("/playlists/{}", playlist_id))).into_response())
}

/// Delete a playlist and its cover
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    PagePath(playlist_id): PagePath<i64>,
    jar: CookieJar,
) -> PageResult {
    let playlist = {
        let db = state.db.lock().await;
        let playlist = queries::find_playlist(&db, user.id, playlist_id)?
            .ok_or_else(|| not_found(playlist_id))?;
        queries::delete_playlist(&db, user.id, playlist_id)?;
        playlist
    };

    if let Some(cover) = playlist.cover.as_deref() {
        state.covers().remove(cover).await;
    }

    tracing::info!(user_id = user.id, playlist_id, "Playlist deleted");
    let jar = flash::push(jar, Flash::info(format!("Playlist \"{}\" deleted", playlist.title)));
    Ok((jar, Redirect::to("/playlists")).into_response())
}

/// Add one of the user's tracks to the playlist
pub async fn add_track(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    PagePath(playlist_id): PagePath<i64>,
    jar: CookieJar,
    Form(form): Form<AddTrackForm>,
) -> PageResult {
    let track_id = form.track_id().ok_or_else(|| {
        PageError::from(AppError::NotFound(format!("/playlists/{}/tracks", playlist_id)))
    })?;

    let (track, inserted) = {
        let db = state.db.lock().await;
        queries::find_playlist(&db, user.id, playlist_id)?.ok_or_else(|| not_found(playlist_id))?;
        let track = queries::find_track(&db, user.id, track_id)?
            .ok_or_else(|| AppError::NotFound(format!("/songs/{}", track_id)))?;
        let inserted = queries::add_playlist_track(&db, playlist_id, track.id)?;
        (track, inserted)
    };

    let flash = match inserted {
        Insert::Created(_) => {
            tracing::info!(user_id = user.id, playlist_id, track_id = track.id, "Track added to playlist");
            Flash::success(format!("Added \"{}\" to the playlist", track.title))
        }
        Insert::Duplicate => {
            Flash::warning(format!("\"{}\" is already in this playlist", track.title))
        }
    };

    let jar = flash::push(jar, flash);
    Ok((jar, Redirect::to(&format!("/playlists/{}", playlist_id))).into_response())
}

/// Remove a track from the playlist
pub async fn remove_track(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    PagePath((playlist_id, track_id)): PagePath<(i64, i64)>,
    jar: CookieJar,
) -> PageResult {
    let removed = {
        let db = state.db.lock().await;
        queries::find_playlist(&db, user.id, playlist_id)?.ok_or_else(|| not_found(playlist_id))?;
        queries::remove_playlist_track(&db, playlist_id, track_id)?
    };

    if !removed {
        return Err(AppError::NotFound(format!(
            "/playlists/{}/tracks/{}",
            playlist_id, track_id
        ))
        .into());
    }

    tracing::info!(user_id = user.id, playlist_id, track_id, "Track removed from playlist");
    let jar = flash::push(jar, Flash::info("Track removed from the playlist"));
    Ok((jar, Redirect::to(&format!("/playlists/{}", playlist_id))).into_response())
}
