//! Public read endpoints for the news site. No authentication.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::{get, post},
};
use db::models::member::Member;
use db::models::highlight::{Highlight, HighlightedPublication};
use db::models::publication::{Publication, PublicationWithAuthor};
use serde::Deserialize;
use services::services::app::App;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Deserialize)]
pub struct NewsQueryParams {
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct SearchQueryParams {
    pub q: String,
    pub limit: Option<i64>,
}

#[derive(Deserialize, Default)]
pub struct ViewRequest {
    #[serde(default)]
    pub unique: bool,
}

#[derive(Deserialize)]
pub struct YoutubeQueryParams {
    pub channel_id: String,
}

/// GET /api/public/news - Published articles, newest first
pub async fn list_news(
    State(app): State<App>,
    Query(params): Query<NewsQueryParams>,
) -> Result<ResponseJson<ApiResponse<Vec<PublicationWithAuthor>>>, ApiError> {
    let news = Publication::list_published(
        app.pool(),
        params.category.as_deref(),
        params.limit,
        params.offset,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(news)))
}

/// GET /api/public/news/{slug}
pub async fn get_news(
    State(app): State<App>,
    Path(slug): Path<String>,
) -> Result<ResponseJson<ApiResponse<PublicationWithAuthor>>, ApiError> {
    let publication = Publication::find_published_by_slug(app.pool(), &slug)
        .await?
        .ok_or(ApiError::Database(sqlx::Error::RowNotFound))?;
    Ok(ResponseJson(ApiResponse::success(publication)))
}

/// POST /api/public/news/{slug}/view - Count a read
///
/// The body carries `{"unique": true}` on a visitor's first view, as
/// tracked client-side; without a body only the total counter moves.
pub async fn record_view(
    State(app): State<App>,
    Path(slug): Path<String>,
    payload: Option<Json<ViewRequest>>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let unique = payload.map(|Json(p)| p.unique).unwrap_or(false);
    let rows_affected = Publication::record_view(app.pool(), &slug, unique).await?;
    if rows_affected == 0 {
        return Err(ApiError::Database(sqlx::Error::RowNotFound));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

/// GET /api/public/search?q= - Search published articles
pub async fn search(
    State(app): State<App>,
    Query(params): Query<SearchQueryParams>,
) -> Result<ResponseJson<ApiResponse<Vec<PublicationWithAuthor>>>, ApiError> {
    let query = params.q.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("q is required".into()));
    }
    let results = Publication::search_published(app.pool(), query, params.limit).await?;
    Ok(ResponseJson(ApiResponse::success(results)))
}

/// GET /api/public/journalists - The public team page
pub async fn list_journalists(
    State(app): State<App>,
) -> Result<ResponseJson<ApiResponse<Vec<Member>>>, ApiError> {
    let journalists = Member::list_public_team(app.pool()).await?;
    Ok(ResponseJson(ApiResponse::success(journalists)))
}

/// GET /api/public/journalists/{id}
pub async fn get_journalist(
    State(app): State<App>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Member>>, ApiError> {
    let journalist = Member::find_by_id(app.pool(), id)
        .await?
        .filter(|m| m.deleted_at.is_none() && m.is_team_member)
        .ok_or(ApiError::Database(sqlx::Error::RowNotFound))?;
    Ok(ResponseJson(ApiResponse::success(journalist)))
}

/// GET /api/public/highlights - Home-page highlight slots
pub async fn list_highlights(
    State(app): State<App>,
) -> Result<ResponseJson<ApiResponse<Vec<HighlightedPublication>>>, ApiError> {
    let highlights = Highlight::list_with_publications(app.pool()).await?;
    Ok(ResponseJson(ApiResponse::success(highlights)))
}

/// GET /api/public/youtube?channel_id= - Proxied channel feed XML
pub async fn youtube_feed(
    State(app): State<App>,
    Query(params): Query<YoutubeQueryParams>,
) -> Result<Response, ApiError> {
    let xml = app.youtube.feed(&params.channel_id).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        xml.as_str().to_owned(),
    )
        .into_response())
}

pub fn router() -> Router<App> {
    let inner = Router::new()
        .route("/news", get(list_news))
        .route("/news/{slug}", get(get_news))
        .route("/news/{slug}/view", post(record_view))
        .route("/search", get(search))
        .route("/journalists", get(list_journalists))
        .route("/journalists/{id}", get(get_journalist))
        .route("/highlights", get(list_highlights))
        .route("/youtube", get(youtube_feed));

    Router::new().nest("/public", inner)
}
