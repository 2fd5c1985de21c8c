//! Application services for Meloman.

pub mod auth;
pub mod catalog;
pub mod covers;

pub use auth::{AuthService, Claims};
pub use covers::CoverStore;
