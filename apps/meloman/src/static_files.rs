//! Stylesheet and autocomplete script, embedded into the binary.

use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "static/"]
pub struct StaticAssets;

/// Asset names are not content-hashed, so caching stays short.
const CACHE_CONTROL: &str = "public, max-age=3600";

/// Serve embedded static files at /static/*path
pub async fn serve_static(Path(path): Path<String>) -> Response {
    let Some(content) = StaticAssets::get(&path) else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    (
        [
            (header::CONTENT_TYPE, mime.essence_str().to_string()),
            (header::CACHE_CONTROL, CACHE_CONTROL.to_string()),
        ],
        content.data.into_owned(),
    )
        .into_response()
}
