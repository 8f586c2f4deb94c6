use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::highlight::{Highlight, HighlightedPublication};
use serde::Deserialize;
use services::services::app::App;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::{CurrentUser, require_session},
};

#[derive(Deserialize)]
pub struct PinRequest {
    pub publication_id: Uuid,
}

/// GET /api/highlights - Current home-page pins
pub async fn list_highlights(
    State(app): State<App>,
) -> Result<ResponseJson<ApiResponse<Vec<HighlightedPublication>>>, ApiError> {
    let highlights = Highlight::list_with_publications(app.pool()).await?;
    Ok(ResponseJson(ApiResponse::success(highlights)))
}

/// PUT /api/highlights/{slot} - Pin a published article (admin)
pub async fn pin_highlight(
    Extension(user): Extension<CurrentUser>,
    State(app): State<App>,
    Path(slot): Path<i64>,
    Json(payload): Json<PinRequest>,
) -> Result<ResponseJson<ApiResponse<Highlight>>, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden);
    }
    let highlight = Highlight::pin(app.pool(), slot, payload.publication_id).await?;
    Ok(ResponseJson(ApiResponse::success(highlight)))
}

/// DELETE /api/highlights/{slot} - Empty a slot (admin)
pub async fn unpin_highlight(
    Extension(user): Extension<CurrentUser>,
    State(app): State<App>,
    Path(slot): Path<i64>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden);
    }
    if !Highlight::unpin(app.pool(), slot).await? {
        return Err(ApiError::Database(sqlx::Error::RowNotFound));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(app: &App) -> Router<App> {
    let inner = Router::new()
        .route("/", get(list_highlights))
        .route("/{slot}", axum::routing::put(pin_highlight).delete(unpin_highlight))
        .layer(from_fn_with_state(app.clone(), require_session));

    Router::new().nest("/highlights", inner)
}
