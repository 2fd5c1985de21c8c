//! Session middleware for Meloman.
//!
//! Resolves the `session` cookie to the logged-in user and guards pages and
//! JSON endpoints.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::AppState;

/// Name of the cookie holding the signed session token.
pub const SESSION_COOKIE: &str = "session";

/// The authenticated user, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub email: String,
}

/// Extracts the session token from the request cookies.
fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Resolves the session to a user that still exists.
async fn resolve_user(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser> {
    let token = extract_session_token(headers).ok_or(AppError::Unauthorized)?;
    let claims = state.auth_service().verify_token(&token)?;

    let db = state.db.lock().await;
    let user = queries::find_user_by_id(&db, claims.sub)?.ok_or_else(|| {
        tracing::debug!(user_id = claims.sub, "Session refers to a deleted user");
        AppError::Unauthorized
    })?;

    Ok(CurrentUser {
        id: user.id,
        email: user.email,
    })
}

/// The logged-in user, if any. Used by public pages.
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> Option<CurrentUser> {
    resolve_user(state, headers).await.ok()
}

/// Authentication middleware for JSON endpoints.
///
/// Rejects requests without a valid session with `401 Unauthorized`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let user = resolve_user(&state, request.headers()).await?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Authentication middleware for HTML pages.
///
/// Redirects to `/login` when there is no valid session.
pub async fn require_login(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match resolve_user(&state, request.headers()).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(AppError::Unauthorized) => Redirect::to("/login").into_response(),
        Err(e) => e.into_response(),
    }
}
