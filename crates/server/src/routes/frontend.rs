//! Static serving: the embedded frontend bundle, uploaded media and the
//! generated sitemap.

use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;
use services::services::app::App;

#[derive(RustEmbed)]
#[folder = "../../frontend/dist"]
struct Frontend;

pub async fn serve_frontend_root() -> Response {
    serve_asset("index.html")
}

/// Any path not matched elsewhere: an embedded asset, or index.html so
/// deep links into the public site resolve.
pub async fn serve_frontend(Path(path): Path<String>) -> Response {
    let path = path.trim_start_matches('/');
    if Frontend::get(path).is_some() {
        serve_asset(path)
    } else {
        serve_asset("index.html")
    }
}

fn serve_asset(path: &str) -> Response {
    match Frontend::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime.as_ref())],
                content.data.into_owned(),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

/// GET /sitemap.xml - The file the sitemap task maintains
pub async fn serve_sitemap() -> Response {
    match tokio::fs::read(utils::assets::sitemap_path()).await {
        Ok(xml) => (
            [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
            xml,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "sitemap not generated yet").into_response(),
    }
}

/// GET /uploads/{*path} - Uploaded publication images and avatars
pub async fn serve_upload(State(app): State<App>, Path(path): Path<String>) -> Response {
    let Ok(resolved) = app.media.resolve(&path) else {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };

    match tokio::fs::read(&resolved).await {
        Ok(data) => {
            let mime = mime_guess::from_path(&resolved).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.as_ref())], data).into_response()
        }
        Err(_) => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}
