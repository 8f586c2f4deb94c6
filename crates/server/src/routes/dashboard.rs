use axum::{
    Router, extract::State, middleware::from_fn_with_state, response::Json as ResponseJson,
    routing::get,
};
use db::models::dashboard::DashboardSummary;
use services::services::app::App;
use utils::response::ApiResponse;

use crate::{error::ApiError, middleware::require_session};

/// GET /api/dashboard - Aggregate editorial metrics
pub async fn get_dashboard(
    State(app): State<App>,
) -> Result<ResponseJson<ApiResponse<DashboardSummary>>, ApiError> {
    let summary = DashboardSummary::fetch(app.pool()).await?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

pub fn router(app: &App) -> Router<App> {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .layer(from_fn_with_state(app.clone(), require_session))
}
