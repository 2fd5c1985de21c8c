use askama::Template;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Extension,
};
use axum_extra::extract::cookie::CookieJar;

use crate::db::queries;
use crate::middleware::{current_user, CurrentUser};
use crate::AppState;

use super::flash;
use super::{Layout, PageResult};

#[derive(Template)]
#[template(path = "pages/index.html")]
pub struct IndexTemplate {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "pages/dashboard.html")]
pub struct DashboardTemplate {
    pub layout: Layout,
    pub track_count: i64,
    pub playlist_count: i64,
    pub catalog_count: i64,
}

/// Landing page
pub async fn index(State(state): State<AppState>, headers: HeaderMap, jar: CookieJar) -> Response {
    let user = current_user(&state, &headers).await;
    let (jar, flash) = flash::take(jar);

    (
        jar,
        IndexTemplate {
            layout: Layout::new(user.as_ref(), flash, "home"),
        },
    )
        .into_response()
}

/// Personal dashboard with library statistics
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> PageResult {
    let (track_count, playlist_count, catalog_count) = {
        let db = state.db.lock().await;
        (
            queries::count_tracks(&db, user.id)?,
            queries::count_playlists(&db, user.id)?,
            queries::count_catalog(&db)?,
        )
    };

    let (jar, flash) = flash::take(jar);
    Ok((
        jar,
        DashboardTemplate {
            layout: Layout::new(Some(&user), flash, "dashboard"),
            track_count,
            playlist_count,
            catalog_count,
        },
    )
        .into_response())
}
