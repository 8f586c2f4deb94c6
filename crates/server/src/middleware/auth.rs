//! Session extraction and role guards.
//!
//! `require_session` turns the `session` cookie into a loaded
//! `CurrentUser` extension; handlers behind it can rely on the member
//! being active. `require_admin` layers on top for admin-only routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use db::models::member::Member;
use services::services::app::App;

use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "session";

/// The authenticated member making the request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Member);

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.0.is_admin()
    }
}

pub async fn require_session(
    State(app): State<App>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value())
        .ok_or(ApiError::Unauthorized)?;

    let session = app.sessions.validate(token)?;

    // Soft-deleted members lose access immediately, valid token or not
    let member = Member::find_by_id(app.pool(), session.member_id)
        .await?
        .filter(|m| m.deleted_at.is_none())
        .ok_or(ApiError::Unauthorized)?;

    request.extensions_mut().insert(CurrentUser(member));
    Ok(next.run(request).await)
}

/// Must be layered inside `require_session`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let is_admin = request
        .extensions()
        .get::<CurrentUser>()
        .is_some_and(CurrentUser::is_admin);

    if !is_admin {
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(request).await)
}
