use axum::{
    Extension, Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use db::models::member::Member;
use serde::Deserialize;
use services::services::app::App;
use services::services::auth::verify_password;
use utils::response::ApiResponse;

use crate::{
    error::ApiError,
    middleware::{CurrentUser, auth::SESSION_COOKIE, require_session},
};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/login - Authenticate and set the session cookie
pub async fn login(
    State(app): State<App>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, ResponseJson<ApiResponse<Member>>), ApiError> {
    let member = Member::find_active_by_email(app.pool(), &payload.email)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&payload.password, &member.password_digest) {
        return Err(ApiError::Unauthorized);
    }

    let token = app.sessions.issue(member.id)?;
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    tracing::info!(member_id = %member.id, "Member logged in");
    Ok((jar.add(cookie), ResponseJson(ApiResponse::success(member))))
}

/// POST /api/auth/logout - Clear the session cookie
pub async fn logout(jar: CookieJar) -> (CookieJar, ResponseJson<ApiResponse<()>>) {
    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .build();
    (
        jar.remove(cookie),
        ResponseJson(ApiResponse::success(())),
    )
}

/// GET /api/auth/session - The currently authenticated member
pub async fn session(
    Extension(user): Extension<CurrentUser>,
) -> ResponseJson<ApiResponse<Member>> {
    ResponseJson(ApiResponse::success(user.0))
}

pub fn router(app: &App) -> Router<App> {
    let session_routes = Router::new()
        .route("/session", get(session))
        .layer(from_fn_with_state(app.clone(), require_session));

    let inner = Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .merge(session_routes);

    Router::new().nest("/auth", inner)
}
