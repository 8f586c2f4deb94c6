use axum::{
    Extension, Json, Router,
    extract::{Multipart, Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::member::{CreateMember, Member, MemberRole, UpdateMember};
use serde::Deserialize;
use services::services::app::App;
use services::services::auth::hash_password;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::{CurrentUser, load_member_middleware, require_session},
};

#[derive(Deserialize)]
pub struct MemberQueryParams {
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Deserialize)]
pub struct CreateMemberRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<MemberRole>,
    pub bio: Option<String>,
    pub is_team_member: Option<bool>,
}

/// GET /api/members - List members (admin)
pub async fn list_members(
    Extension(user): Extension<CurrentUser>,
    State(app): State<App>,
    Query(params): Query<MemberQueryParams>,
) -> Result<ResponseJson<ApiResponse<Vec<Member>>>, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden);
    }
    let members = Member::list(app.pool(), params.include_deleted).await?;
    Ok(ResponseJson(ApiResponse::success(members)))
}

/// POST /api/members - Create a member account (admin)
pub async fn create_member(
    Extension(user): Extension<CurrentUser>,
    State(app): State<App>,
    Json(payload): Json<CreateMemberRequest>,
) -> Result<ResponseJson<ApiResponse<Member>>, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden);
    }
    if payload.name.trim().is_empty() || payload.email.trim().is_empty() {
        return Err(ApiError::BadRequest("name and email are required".into()));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "password must be at least 8 characters".into(),
        ));
    }

    let data = CreateMember {
        name: payload.name,
        email: payload.email,
        password_digest: hash_password(&payload.password),
        role: payload.role,
        bio: payload.bio,
        is_team_member: payload.is_team_member,
    };
    let member = Member::create(app.pool(), &data, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(member)))
}

/// GET /api/members/{id} - Fetch a member (admin)
pub async fn get_member(
    Extension(user): Extension<CurrentUser>,
    Extension(member): Extension<Member>,
) -> Result<ResponseJson<ApiResponse<Member>>, ApiError> {
    if !user.is_admin() && user.0.id != member.id {
        return Err(ApiError::Forbidden);
    }
    Ok(ResponseJson(ApiResponse::success(member)))
}

/// PUT /api/members/{id} - Update profile (self or admin)
pub async fn update_member(
    Extension(user): Extension<CurrentUser>,
    Extension(member): Extension<Member>,
    State(app): State<App>,
    Json(payload): Json<UpdateMember>,
) -> Result<ResponseJson<ApiResponse<Member>>, ApiError> {
    let is_self = user.0.id == member.id;
    if !user.is_admin() && !is_self {
        return Err(ApiError::Forbidden);
    }
    // Only admins may change role or team visibility
    if !user.is_admin()
        && (payload.role.is_some_and(|r| r != member.role)
            || payload
                .is_team_member
                .is_some_and(|t| t != member.is_team_member))
    {
        return Err(ApiError::Forbidden);
    }

    if let Some(password) = &payload.password {
        if password.len() < 8 {
            return Err(ApiError::BadRequest(
                "password must be at least 8 characters".into(),
            ));
        }
        Member::update_password_digest(app.pool(), member.id, &hash_password(password)).await?;
    }

    let updated = Member::update(
        app.pool(),
        member.id,
        payload.name.unwrap_or(member.name),
        payload.email.unwrap_or(member.email),
        payload.bio.or(member.bio),
        payload.role.unwrap_or(member.role),
        payload.is_team_member.unwrap_or(member.is_team_member),
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

/// DELETE /api/members/{id} - Soft delete (admin)
pub async fn delete_member(
    Extension(user): Extension<CurrentUser>,
    Extension(member): Extension<Member>,
    State(app): State<App>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden);
    }
    if user.0.id == member.id {
        return Err(ApiError::Conflict(
            "cannot delete your own account".into(),
        ));
    }

    let rows_affected = Member::soft_delete(app.pool(), member.id).await?;
    if rows_affected == 0 {
        return Err(ApiError::Conflict("member is already deleted".into()));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/members/{id}/restore - Undo a soft delete (admin)
pub async fn restore_member(
    Extension(user): Extension<CurrentUser>,
    Extension(member): Extension<Member>,
    State(app): State<App>,
) -> Result<ResponseJson<ApiResponse<Member>>, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let rows_affected = Member::restore(app.pool(), member.id).await?;
    if rows_affected == 0 {
        return Err(ApiError::Conflict("member is not deleted".into()));
    }
    let restored = Member::find_by_id(app.pool(), member.id)
        .await?
        .ok_or(ApiError::Database(sqlx::Error::RowNotFound))?;
    Ok(ResponseJson(ApiResponse::success(restored)))
}

/// POST /api/members/{id}/avatar - Upload an avatar image (self or admin)
pub async fn upload_avatar(
    Extension(user): Extension<CurrentUser>,
    Extension(member): Extension<Member>,
    State(app): State<App>,
    mut multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<Member>>, ApiError> {
    if !user.is_admin() && user.0.id != member.id {
        return Err(ApiError::Forbidden);
    }

    let field = multipart
        .next_field()
        .await?
        .ok_or_else(|| ApiError::BadRequest("missing file field".into()))?;
    let filename = field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest("missing filename".into()))?;
    let data = field.bytes().await?;

    let avatar_path = app.media.store_avatar(member.id, &filename, &data)?;
    Member::update_avatar_path(app.pool(), member.id, &avatar_path).await?;

    let updated = Member::find_by_id(app.pool(), member.id)
        .await?
        .ok_or(ApiError::Database(sqlx::Error::RowNotFound))?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub fn router(app: &App) -> Router<App> {
    let member_router = Router::new()
        .route(
            "/",
            get(get_member).put(update_member).delete(delete_member),
        )
        .route("/restore", post(restore_member))
        .route("/avatar", post(upload_avatar))
        .layer(from_fn_with_state(app.clone(), load_member_middleware));

    let inner = Router::new()
        .route("/", get(list_members).post(create_member))
        .nest("/{member_id}", member_router)
        .layer(from_fn_with_state(app.clone(), require_session));

    Router::new().nest("/members", inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{seed_user, test_app};

    fn no_changes() -> UpdateMember {
        UpdateMember {
            name: None,
            email: None,
            bio: None,
            role: None,
            is_team_member: None,
            password: None,
        }
    }

    fn new_hire(email: &str) -> CreateMemberRequest {
        CreateMemberRequest {
            name: "New Hire".to_string(),
            email: email.to_string(),
            password: "longenough".to_string(),
            role: None,
            bio: None,
            is_team_member: None,
        }
    }

    #[tokio::test]
    async fn test_account_management_is_admin_only() {
        let (app, _temp_dir) = test_app().await;
        let admin = seed_user(&app, "Root Admin", MemberRole::Admin).await;
        let writer = seed_user(&app, "Staff Writer", MemberRole::Journalist).await;

        assert!(matches!(
            create_member(
                Extension(writer.clone()),
                State(app.clone()),
                Json(new_hire("denied@example.com")),
            )
            .await,
            Err(ApiError::Forbidden)
        ));
        assert!(matches!(
            list_members(
                Extension(writer.clone()),
                State(app.clone()),
                Query(MemberQueryParams {
                    include_deleted: false
                }),
            )
            .await,
            Err(ApiError::Forbidden)
        ));
        assert!(matches!(
            delete_member(
                Extension(writer.clone()),
                Extension(admin.0.clone()),
                State(app.clone()),
            )
            .await,
            Err(ApiError::Forbidden)
        ));
        assert!(matches!(
            restore_member(
                Extension(writer.clone()),
                Extension(admin.0.clone()),
                State(app.clone()),
            )
            .await,
            Err(ApiError::Forbidden)
        ));

        // Admins can create and delete accounts, but not their own
        create_member(
            Extension(admin.clone()),
            State(app.clone()),
            Json(new_hire("new.hire@example.com")),
        )
        .await
        .expect("Admin creates an account");

        delete_member(
            Extension(admin.clone()),
            Extension(writer.0.clone()),
            State(app.clone()),
        )
        .await
        .expect("Admin soft deletes an account");

        assert!(matches!(
            delete_member(
                Extension(admin.clone()),
                Extension(admin.0.clone()),
                State(app.clone()),
            )
            .await,
            Err(ApiError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_journalists_cannot_escalate_or_edit_others() {
        let (app, _temp_dir) = test_app().await;
        let writer = seed_user(&app, "Staff Writer", MemberRole::Journalist).await;
        let other = seed_user(&app, "Other Writer", MemberRole::Journalist).await;

        // Role changes on the own account are an admin matter
        let escalate = UpdateMember {
            role: Some(MemberRole::Admin),
            ..no_changes()
        };
        assert!(matches!(
            update_member(
                Extension(writer.clone()),
                Extension(writer.0.clone()),
                State(app.clone()),
                Json(escalate),
            )
            .await,
            Err(ApiError::Forbidden)
        ));

        // Another member's profile is off limits entirely
        let rename = UpdateMember {
            name: Some("Renamed".to_string()),
            ..no_changes()
        };
        assert!(matches!(
            update_member(
                Extension(writer.clone()),
                Extension(other.0.clone()),
                State(app.clone()),
                Json(rename),
            )
            .await,
            Err(ApiError::Forbidden)
        ));

        // Plain profile edits on the own account go through
        let bio = UpdateMember {
            bio: Some("City desk".to_string()),
            ..no_changes()
        };
        let updated = update_member(
            Extension(writer.clone()),
            Extension(writer.0.clone()),
            State(app.clone()),
            Json(bio),
        )
        .await
        .expect("Self profile edit succeeds");
        assert_eq!(updated.0.data.unwrap().bio.as_deref(), Some("City desk"));
    }
}
