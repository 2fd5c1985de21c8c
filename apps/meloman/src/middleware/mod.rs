//! Request middleware for Meloman.

pub mod auth;

pub use auth::{auth_middleware, current_user, require_login, CurrentUser, SESSION_COOKIE};
