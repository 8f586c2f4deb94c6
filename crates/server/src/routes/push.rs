use axum::{
    Json, Router, extract::State, response::Json as ResponseJson, routing::{get, post},
};
use db::models::push_subscription::{CreateSubscription, PushSubscription};
use serde::{Deserialize, Serialize};
use services::services::app::App;
use utils::response::ApiResponse;

use crate::error::ApiError;

#[derive(Serialize)]
pub struct PublicKeyResponse {
    /// base64url VAPID public key, absent when push is unsigned.
    pub public_key: Option<String>,
}

#[derive(Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

/// GET /api/push/public-key - Key for `PushManager.subscribe()`
pub async fn public_key(State(app): State<App>) -> ResponseJson<ApiResponse<PublicKeyResponse>> {
    ResponseJson(ApiResponse::success(PublicKeyResponse {
        public_key: app.push.public_key().map(str::to_string),
    }))
}

/// POST /api/push/subscribe - Register or refresh a browser subscription
pub async fn subscribe(
    State(app): State<App>,
    Json(payload): Json<CreateSubscription>,
) -> Result<ResponseJson<ApiResponse<PushSubscription>>, ApiError> {
    if payload.endpoint.trim().is_empty() {
        return Err(ApiError::BadRequest("endpoint is required".into()));
    }
    let subscription = PushSubscription::upsert(app.pool(), &payload).await?;
    Ok(ResponseJson(ApiResponse::success(subscription)))
}

/// POST /api/push/unsubscribe
pub async fn unsubscribe(
    State(app): State<App>,
    Json(payload): Json<UnsubscribeRequest>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    PushSubscription::deactivate_by_endpoint(app.pool(), &payload.endpoint).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<App> {
    let inner = Router::new()
        .route("/public-key", get(public_key))
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", post(unsubscribe));

    Router::new().nest("/push", inner)
}
