//! "I'm feeling lucky": a random catalog song the user does not own yet.

use askama::Template;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect},
    Extension,
};
use axum_extra::extract::cookie::CookieJar;

use crate::db::models::CatalogEntry;
use crate::db::queries::{self, Insert};
use crate::middleware::CurrentUser;
use crate::services::catalog;
use crate::AppState;

use super::flash::{self, Flash};
use super::{Layout, PagePath, PageResult};

#[derive(Template)]
#[template(path = "pages/lucky.html")]
pub struct LuckyTemplate {
    pub layout: Layout,
    pub entry: Option<CatalogEntry>,
}

/// Show a random unowned catalog entry
pub async fn page(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> PageResult {
    let entry = {
        let db = state.db.lock().await;
        catalog::lucky_for_user(&db, user.id, &mut rand::thread_rng())?
    };

    let (jar, flash) = flash::take(jar);
    Ok((
        jar,
        LuckyTemplate {
            layout: Layout::new(Some(&user), flash, "lucky"),
            entry,
        },
    )
        .into_response())
}

/// Add the suggested catalog entry to the user's list
pub async fn add(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    PagePath(catalog_id): PagePath<i64>,
    jar: CookieJar,
) -> PageResult {
    let (entry, inserted) = {
        let db = state.db.lock().await;
        match queries::find_catalog_entry(&db, catalog_id)? {
            Some(entry) => {
                let inserted = queries::insert_track(&db, user.id, &entry.title, &entry.artist)?;
                (entry, inserted)
            }
            None => {
                let jar = flash::push(jar, Flash::warning("Song not found in the catalog"));
                return Ok((jar, Redirect::to("/lucky")).into_response());
            }
        }
    };

    let flash = match inserted {
        Insert::Created(track_id) => {
            tracing::info!(user_id = user.id, track_id, catalog_id, "Lucky track added");
            Flash::success(format!("Added \"{}\" by {}", entry.title, entry.artist))
        }
        Insert::Duplicate => Flash::info(format!(
            "\"{}\" by {} is already in your list",
            entry.title, entry.artist
        )),
    };

    Ok((flash::push(jar, flash), Redirect::to("/songs")).into_response())
}
