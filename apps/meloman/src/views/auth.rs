//! Registration, login, logout and account deletion

use askama::Template;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;

use crate::db::queries::{self, Insert};
use crate::middleware::{current_user, CurrentUser, SESSION_COOKIE};
use crate::AppState;

use super::flash::{self, Flash};
use super::utils::{is_valid_email, FormErrors};
use super::{Layout, PageResult};

const EMAIL_MAX: usize = 255;
const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 64;

#[derive(Template)]
#[template(path = "pages/register.html")]
pub struct RegisterTemplate {
    pub layout: Layout,
    pub email: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub email: String,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "pages/delete_account.html")]
pub struct DeleteAccountTemplate {
    pub layout: Layout,
    pub errors: FormErrors,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct DeleteAccountForm {
    #[serde(default)]
    pub password: String,
}

/// Emails are stored and compared trimmed and lowercased.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_credentials(errors: &mut FormErrors, email: &str, password: &str) {
    if email.is_empty() {
        errors.add("email", "This field is required");
    } else if email.chars().count() > EMAIL_MAX || !is_valid_email(email) {
        errors.add("email", "Invalid email address");
    }
    errors.check_length("password", password, PASSWORD_MIN, PASSWORD_MAX);
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(::time::Duration::days(7))
        .build()
}

fn clear_session(jar: CookieJar) -> CookieJar {
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(::time::Duration::ZERO)
        .build();
    jar.remove(cookie)
}

/// Signs the user in and redirects to the dashboard.
fn start_session(
    state: &AppState,
    jar: CookieJar,
    user_id: i64,
    email: &str,
    message: &str,
) -> PageResult {
    let token = state.auth_service().create_token(user_id, email)?;
    let jar = jar.add(session_cookie(token, state.config.server.secure_cookies));
    let jar = flash::push(jar, Flash::success(message));
    Ok((jar, Redirect::to("/dashboard")).into_response())
}

/// Render the registration page
pub async fn register_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    if current_user(&state, &headers).await.is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    let (jar, flash) = flash::take(jar);
    (
        jar,
        RegisterTemplate {
            layout: Layout::new(None, flash, "register"),
            email: String::new(),
            errors: FormErrors::default(),
        },
    )
        .into_response()
}

/// Handle registration form submission
pub async fn register_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> PageResult {
    if current_user(&state, &headers).await.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let email = normalize_email(&form.email);
    let mut errors = FormErrors::default();
    validate_credentials(&mut errors, &email, &form.password);
    if form.password2.is_empty() {
        errors.add("password2", "This field is required");
    } else if form.password2 != form.password {
        errors.add("password2", "Passwords must match");
    }

    let rerender = |flash: Option<Flash>, errors: FormErrors| {
        RegisterTemplate {
            layout: Layout::new(None, flash, "register"),
            email: email.clone(),
            errors,
        }
        .into_response()
    };

    if !errors.is_empty() {
        return Ok(rerender(None, errors));
    }

    // Hash before taking the database lock
    let password_hash = state.auth_service().hash_password(&form.password)?;

    let inserted = {
        let db = state.db.lock().await;
        queries::insert_user(&db, &email, &password_hash)?
    };

    match inserted {
        Insert::Created(user_id) => {
            tracing::info!(user_id, "User registered");
            start_session(&state, jar, user_id, &email, "Registration complete")
        }
        Insert::Duplicate => Ok(rerender(
            Some(Flash::warning("A user with this email is already registered")),
            FormErrors::default(),
        )),
    }
}

/// Render the login page
pub async fn login_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    if current_user(&state, &headers).await.is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    let (jar, flash) = flash::take(jar);
    (
        jar,
        LoginTemplate {
            layout: Layout::new(None, flash, "login"),
            email: String::new(),
            errors: FormErrors::default(),
        },
    )
        .into_response()
}

/// Handle login form submission
pub async fn login_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> PageResult {
    if current_user(&state, &headers).await.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }

    let email = normalize_email(&form.email);
    let mut errors = FormErrors::default();
    validate_credentials(&mut errors, &email, &form.password);
    if !errors.is_empty() {
        return Ok(LoginTemplate {
            layout: Layout::new(None, None, "login"),
            email,
            errors,
        }
        .into_response());
    }

    let user = {
        let db = state.db.lock().await;
        queries::find_user_by_email(&db, &email)?
    };

    let authenticated = state
        .auth_service()
        .check_login(&form.password, user.as_ref().map(|u| u.password_hash.as_str()));

    match user {
        Some(user) if authenticated => {
            tracing::info!(user_id = user.id, "User logged in");
            start_session(&state, jar, user.id, &user.email, "You are logged in")
        }
        _ => {
            tracing::debug!("Failed login attempt");
            Ok(LoginTemplate {
                layout: Layout::new(None, Some(Flash::danger("Invalid email or password")), "login"),
                email,
                errors: FormErrors::default(),
            }
            .into_response())
        }
    }
}

/// Handle logout
pub async fn logout(Extension(user): Extension<CurrentUser>, jar: CookieJar) -> Response {
    tracing::info!(user_id = user.id, "User logged out");

    let jar = flash::push(clear_session(jar), Flash::info("You have logged out"));
    (jar, Redirect::to("/")).into_response()
}

/// Render the account deletion confirmation page
pub async fn delete_account_page(Extension(user): Extension<CurrentUser>, jar: CookieJar) -> Response {
    let (jar, flash) = flash::take(jar);
    (
        jar,
        DeleteAccountTemplate {
            layout: Layout::new(Some(&user), flash, "account"),
            errors: FormErrors::default(),
        },
    )
        .into_response()
}

/// Delete the current user after password confirmation.
///
/// Tracks, playlists and memberships are removed by the database; cover
/// files are removed here.
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
    Form(form): Form<DeleteAccountForm>,
) -> PageResult {
    let stored = {
        let db = state.db.lock().await;
        queries::find_user_by_id(&db, user.id)?
    };

    let confirmed = state
        .auth_service()
        .check_login(&form.password, stored.as_ref().map(|u| u.password_hash.as_str()));

    if !confirmed {
        let mut errors = FormErrors::default();
        errors.add("password", "Wrong password");
        return Ok(DeleteAccountTemplate {
            layout: Layout::new(Some(&user), None, "account"),
            errors,
        }
        .into_response());
    }

    let covers: Vec<String> = {
        let db = state.db.lock().await;
        let covers = queries::list_playlists(&db, user.id)?
            .into_iter()
            .filter_map(|summary| summary.playlist.cover)
            .collect();
        queries::delete_user(&db, user.id)?;
        covers
    };

    for cover in &covers {
        state.covers().remove(cover).await;
    }

    tracing::info!(user_id = user.id, "User deleted their account");

    let jar = flash::push(clear_session(jar), Flash::info("Your account has been deleted"));
    Ok((jar, Redirect::to("/")).into_response())
}
