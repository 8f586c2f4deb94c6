use axum::{
    Extension, Json, Router,
    extract::{Multipart, Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::models::member::{Member, MemberRole};
use db::models::notification::Notification;
use db::models::publication::{
    CreatePublication, Publication, PublicationFilter, PublicationStatus, PublicationWithAuthor,
    UpdatePublication,
};
use serde::Deserialize;
use services::services::app::App;
use services::services::push::PushMessage;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::{CurrentUser, load_publication_middleware, require_session},
};

#[derive(Deserialize, Default)]
pub struct ExcludeRequest {
    pub reason: Option<String>,
}

/// Authors may touch their own drafts and review copies; admins anything.
fn can_modify(user: &CurrentUser, publication: &Publication) -> bool {
    user.is_admin()
        || (publication.author_id == user.0.id
            && matches!(
                publication.status,
                PublicationStatus::Draft | PublicationStatus::Review
            ))
}

fn is_author_or_admin(user: &CurrentUser, publication: &Publication) -> bool {
    user.is_admin() || publication.author_id == user.0.id
}

/// GET /api/publications - Filtered listing for the dashboard
pub async fn list_publications(
    State(app): State<App>,
    Query(filter): Query<PublicationFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<PublicationWithAuthor>>>, ApiError> {
    let publications = Publication::list(app.pool(), &filter).await?;
    Ok(ResponseJson(ApiResponse::success(publications)))
}

/// POST /api/publications - Create a draft authored by the caller
pub async fn create_publication(
    Extension(user): Extension<CurrentUser>,
    State(app): State<App>,
    Json(payload): Json<CreatePublication>,
) -> Result<ResponseJson<ApiResponse<Publication>>, ApiError> {
    if payload.title.trim().is_empty() || payload.category.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "title and category are required".into(),
        ));
    }

    let publication =
        Publication::create(app.pool(), &payload, user.0.id, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(publication)))
}

/// GET /api/publications/{id}
pub async fn get_publication(
    Extension(publication): Extension<Publication>,
) -> Result<ResponseJson<ApiResponse<Publication>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(publication)))
}

/// PUT /api/publications/{id} - Edit fields
pub async fn update_publication(
    Extension(user): Extension<CurrentUser>,
    Extension(publication): Extension<Publication>,
    State(app): State<App>,
    Json(payload): Json<UpdatePublication>,
) -> Result<ResponseJson<ApiResponse<Publication>>, ApiError> {
    if !can_modify(&user, &publication) {
        return Err(ApiError::Forbidden);
    }

    let updated = Publication::update(app.pool(), publication.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

/// POST /api/publications/{id}/submit - Send to the review queue
pub async fn submit_publication(
    Extension(user): Extension<CurrentUser>,
    Extension(publication): Extension<Publication>,
    State(app): State<App>,
) -> Result<ResponseJson<ApiResponse<Publication>>, ApiError> {
    if !is_author_or_admin(&user, &publication) {
        return Err(ApiError::Forbidden);
    }

    let submitted = Publication::submit(app.pool(), publication.id).await?;
    Notification::create_for_role(
        app.pool(),
        MemberRole::Admin,
        "New submission",
        &format!("\"{}\" is awaiting review", submitted.title),
    )
    .await?;

    Ok(ResponseJson(ApiResponse::success(submitted)))
}

/// POST /api/publications/{id}/approve - Publish a reviewed article (admin)
pub async fn approve_publication(
    Extension(user): Extension<CurrentUser>,
    Extension(publication): Extension<Publication>,
    State(app): State<App>,
) -> Result<ResponseJson<ApiResponse<Publication>>, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let published = Publication::approve(app.pool(), publication.id).await?;

    Notification::create_for_member(
        app.pool(),
        published.author_id,
        "Publication approved",
        &format!("\"{}\" is now live", published.title),
    )
    .await?;

    // Push fan-out runs in the background; the approval response doesn't
    // wait for every subscription endpoint
    if let Some(slug) = &published.slug {
        let message = PushMessage {
            title: published.title.clone(),
            body: published.description.clone().unwrap_or_default(),
            url: format!("{}/news/{}", utils::assets::site_url(), slug),
            tag: published.main_category().to_string(),
        };
        let push = app.push.clone();
        tokio::spawn(async move {
            if let Err(e) = push.broadcast(&message).await {
                tracing::warn!(error = %e, "Push broadcast failed");
            }
        });
    }

    app.sitemap.refresh().await;
    Ok(ResponseJson(ApiResponse::success(published)))
}

/// DELETE /api/publications/{id} - Take an article off the site
pub async fn exclude_publication(
    Extension(user): Extension<CurrentUser>,
    Extension(publication): Extension<Publication>,
    State(app): State<App>,
    payload: Option<Json<ExcludeRequest>>,
) -> Result<ResponseJson<ApiResponse<Publication>>, ApiError> {
    if !is_author_or_admin(&user, &publication) {
        return Err(ApiError::Forbidden);
    }

    let reason = payload.and_then(|Json(p)| p.reason);
    let excluded =
        Publication::exclude(app.pool(), publication.id, reason.as_deref()).await?;

    app.sitemap.refresh().await;
    Ok(ResponseJson(ApiResponse::success(excluded)))
}

/// POST /api/publications/{id}/restore - Put an excluded article back (admin)
pub async fn restore_publication(
    Extension(user): Extension<CurrentUser>,
    Extension(publication): Extension<Publication>,
    State(app): State<App>,
) -> Result<ResponseJson<ApiResponse<Publication>>, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let restored = Publication::restore(app.pool(), publication.id).await?;
    app.sitemap.refresh().await;
    Ok(ResponseJson(ApiResponse::success(restored)))
}

/// DELETE /api/publications/{id}/permanent - Remove row and media (admin)
pub async fn delete_publication_permanently(
    Extension(user): Extension<CurrentUser>,
    Extension(publication): Extension<Publication>,
    State(app): State<App>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let deleted = Publication::delete_permanently(app.pool(), publication.id)
        .await?
        .ok_or(ApiError::Database(sqlx::Error::RowNotFound))?;

    // Media removal is best-effort; the row is already gone
    if let Some(image_path) = &deleted.image_path {
        if let Err(e) = app.media.delete(image_path) {
            tracing::warn!(path = %image_path, error = %e, "Failed to delete article image");
        }
    }

    Member::recount_publications(app.pool(), deleted.author_id).await?;
    app.sitemap.refresh().await;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/publications/{id}/image - Upload the article image (multipart)
pub async fn upload_publication_image(
    Extension(user): Extension<CurrentUser>,
    Extension(publication): Extension<Publication>,
    State(app): State<App>,
    mut multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<Publication>>, ApiError> {
    if !can_modify(&user, &publication) {
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

    let image_path = app
        .media
        .store_publication_image(publication.id, &filename, &data)?;
    Publication::update_image(app.pool(), publication.id, &image_path).await?;

    let updated = Publication::find_by_id(app.pool(), publication.id)
        .await?
        .ok_or(ApiError::Database(sqlx::Error::RowNotFound))?;
    Ok(ResponseJson(ApiResponse::success(updated)))
}

pub fn router(app: &App) -> Router<App> {
    let publication_router = Router::new()
        .route(
            "/",
            get(get_publication)
                .put(update_publication)
                .delete(exclude_publication),
        )
        .route("/submit", post(submit_publication))
        .route("/approve", post(approve_publication))
        .route("/restore", post(restore_publication))
        .route("/permanent", delete(delete_publication_permanently))
        .route("/image", post(upload_publication_image))
        .layer(from_fn_with_state(
            app.clone(),
            load_publication_middleware,
        ));

    let inner = Router::new()
        .route("/", get(list_publications).post(create_publication))
        .nest("/{publication_id}", publication_router)
        .layer(from_fn_with_state(app.clone(), require_session));

    Router::new().nest("/publications", inner)
}
