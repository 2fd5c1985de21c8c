//! HTML views
//!
//! Route handlers that render Askama templates. Pages behind a login are
//! guarded by `middleware::require_login`, which provides `CurrentUser`.

pub mod auth;
pub mod flash;
pub mod home;
pub mod lucky;
pub mod playlists;
pub mod songs;
pub mod utils;

use askama::Template;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::{request::Parts, StatusCode, Uri},
    middleware as axum_mw,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::middleware::{self, CurrentUser};
use crate::AppState;

use flash::Flash;

/// Data every page passes to `base.html`.
pub struct Layout {
    pub user_email: Option<String>,
    pub flash: Option<Flash>,
    pub active_page: &'static str,
}

impl Layout {
    pub fn new(user: Option<&CurrentUser>, flash: Option<Flash>, active_page: &'static str) -> Self {
        Self {
            user_email: user.map(|u| u.email.clone()),
            flash,
            active_page,
        }
    }

    pub fn anonymous() -> Self {
        Self::new(None, None, "")
    }

    pub fn is_active(&self, page: &str) -> bool {
        self.active_page == page
    }
}

#[derive(Template)]
#[template(path = "pages/404.html")]
pub struct NotFoundTemplate {
    pub layout: Layout,
    pub path: String,
}

#[derive(Template)]
#[template(path = "pages/error.html")]
pub struct ErrorTemplate {
    pub layout: Layout,
}

/// 404 handler
pub async fn not_found(uri: Uri) -> impl IntoResponse {
    not_found_page(uri.path())
}

fn not_found_page(path: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        NotFoundTemplate {
            layout: Layout::anonymous(),
            path: path.to_string(),
        },
    )
        .into_response()
}

/// Path parameters for page routes.
///
/// Unlike `Path`, a parameter that does not parse (e.g. `/songs/abc/delete`)
/// renders the 404 page instead of a plain-text rejection.
pub struct PagePath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for PagePath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(PagePath(value)),
            Err(rejection) => {
                tracing::debug!(path = %parts.uri.path(), "Bad path parameter: {}", rejection);
                Err(not_found_page(parts.uri.path()))
            }
        }
    }
}

/// Error type for page handlers: renders HTML instead of JSON.
#[derive(Debug)]
pub struct PageError(pub AppError);

impl From<AppError> for PageError {
    fn from(err: AppError) -> Self {
        PageError(err)
    }
}

impl From<rusqlite::Error> for PageError {
    fn from(err: rusqlite::Error) -> Self {
        PageError(AppError::Sqlite(err))
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self.0 {
            AppError::NotFound(what) => not_found_page(&what),
            AppError::Unauthorized => Redirect::to("/login").into_response(),
            other => {
                tracing::error!("Page error: {}", other);
                (
                    other.status(),
                    ErrorTemplate {
                        layout: Layout::anonymous(),
                    },
                )
                    .into_response()
            }
        }
    }
}

/// Result type for page handlers
pub type PageResult = std::result::Result<Response, PageError>;

/// Build the HTML routes
pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(home::index))
        .route(
            "/register",
            get(auth::register_page).post(auth::register_submit),
        )
        .route("/login", get(auth::login_page).post(auth::login_submit));

    let protected = Router::new()
        .route("/logout", post(auth::logout))
        .route(
            "/account/delete",
            get(auth::delete_account_page).post(auth::delete_account),
        )
        .route("/dashboard", get(home::dashboard))
        .route("/songs", get(songs::list).post(songs::add))
        .route("/songs/:id/delete", post(songs::delete))
        .route("/lucky", get(lucky::page))
        .route("/lucky/add/:catalog_id", post(lucky::add))
        .route("/playlists", get(playlists::list))
        .route(
            "/playlists/new",
            get(playlists::new_page).post(playlists::create),
        )
        .route("/playlists/:id", get(playlists::detail))
        .route(
            "/playlists/:id/edit",
            get(playlists::edit_page).post(playlists::update),
        )
        .route("/playlists/:id/delete", post(playlists::delete))
        .route("/playlists/:id/tracks", post(playlists::add_track))
        .route(
            "/playlists/:id/tracks/:track_id/remove",
            post(playlists::remove_track),
        )
        .route_layer(axum_mw::from_fn_with_state(state, middleware::require_login));

    public.merge(protected)
}
