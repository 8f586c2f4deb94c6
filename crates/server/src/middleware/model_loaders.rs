//! Middleware that resolves `{id}` path params into request extensions.
//!
//! Routes nested under an id segment get the loaded model via
//! `Extension<T>`, so handlers never repeat the fetch-or-404 dance.

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use db::models::{member::Member, publication::Publication};
use services::services::app::App;
use uuid::Uuid;

pub async fn load_publication_middleware(
    State(app): State<App>,
    Path(publication_id): Path<Uuid>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let publication = Publication::find_by_id(app.pool(), publication_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load publication");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    request.extensions_mut().insert(publication);
    Ok(next.run(request).await)
}

pub async fn load_member_middleware(
    State(app): State<App>,
    Path(member_id): Path<Uuid>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let member = Member::find_by_id(app.pool(), member_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load member");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    request.extensions_mut().insert(member);
    Ok(next.run(request).await)
}
