//! API error type and its HTTP mapping.
//!
//! Every handler returns `Result<_, ApiError>`; the `IntoResponse` impl
//! turns errors into the uniform `ApiResponse` envelope with the right
//! status code. Database uniqueness violations surface as 409 and
//! `RowNotFound` as 404 so models don't need HTTP knowledge.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

use db::models::highlight::HighlightError;
use db::models::publication::TransitionError;
use services::services::auth::SessionError;
use services::services::media::MediaError;
use services::services::push::PushError;
use services::services::youtube::YoutubeError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Highlight(#[from] HighlightError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Push(#[from] PushError),
    #[error(transparent)]
    Youtube(#[from] YoutubeError),
    #[error(transparent)]
    Multipart(#[from] axum::extract::multipart::MultipartError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::Session(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            ApiError::Database(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                StatusCode::CONFLICT
            }
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Transition(TransitionError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Transition(TransitionError::InvalidTransition { .. }) => {
                StatusCode::CONFLICT
            }
            ApiError::Transition(TransitionError::Database(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Highlight(HighlightError::InvalidSlot(_)) => StatusCode::BAD_REQUEST,
            ApiError::Highlight(HighlightError::PublicationNotFound) => StatusCode::NOT_FOUND,
            ApiError::Highlight(HighlightError::NotPublished(_)) => StatusCode::CONFLICT,
            ApiError::Highlight(HighlightError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Media(MediaError::InvalidExtension(_))
            | ApiError::Media(MediaError::TooLarge)
            | ApiError::Media(MediaError::InvalidPath) => StatusCode::BAD_REQUEST,
            ApiError::Media(MediaError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Youtube(YoutubeError::InvalidChannelId) => StatusCode::BAD_REQUEST,
            ApiError::Youtube(YoutubeError::Request(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Push(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = ?self, "Internal server error");
        }

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Don't leak internals to clients
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::models::publication::PublicationStatus;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Database(sqlx::Error::RowNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Transition(TransitionError::InvalidTransition {
                from: PublicationStatus::Draft,
                attempted: "approve",
            })
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Highlight(HighlightError::InvalidSlot(7)).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Media(MediaError::InvalidExtension("exe".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let response = ApiError::Database(sqlx::Error::PoolClosed).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
