use axum::{
    Extension, Router,
    extract::{Path, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::models::notification::Notification;
use services::services::app::App;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::{CurrentUser, require_session},
};

const FEED_LIMIT: i64 = 50;

/// GET /api/notifications - The caller's feed, newest first
pub async fn list_notifications(
    Extension(user): Extension<CurrentUser>,
    State(app): State<App>,
) -> Result<ResponseJson<ApiResponse<Vec<Notification>>>, ApiError> {
    let notifications =
        Notification::list_for(app.pool(), user.0.id, user.0.role, FEED_LIMIT).await?;
    Ok(ResponseJson(ApiResponse::success(notifications)))
}

/// POST /api/notifications/{id}/read
pub async fn mark_notification_read(
    Extension(user): Extension<CurrentUser>,
    State(app): State<App>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected =
        Notification::mark_read(app.pool(), id, user.0.id, user.0.role).await?;
    if rows_affected == 0 {
        return Err(ApiError::Database(sqlx::Error::RowNotFound));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

/// DELETE /api/notifications/{id}
pub async fn delete_notification(
    Extension(user): Extension<CurrentUser>,
    State(app): State<App>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected = Notification::delete(app.pool(), id, user.0.id, user.0.role).await?;
    if rows_affected == 0 {
        return Err(ApiError::Database(sqlx::Error::RowNotFound));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(app: &App) -> Router<App> {
    let inner = Router::new()
        .route("/", get(list_notifications))
        .route("/{id}/read", post(mark_notification_read))
        .route("/{id}", delete(delete_notification))
        .layer(from_fn_with_state(app.clone(), require_session));

    Router::new().nest("/notifications", inner)
}
