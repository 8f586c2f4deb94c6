//! Aggregate metrics for the editorial dashboard.

use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use super::publication::{PublicationFilter, PublicationStatus, PublicationWithAuthor};
use crate::models::publication::Publication;

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct StatusCounts {
    pub draft: i64,
    pub review: i64,
    pub published: i64,
    pub excluded: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub status_counts: StatusCounts,
    pub total_views: i64,
    pub total_unique_views: i64,
    pub active_members: i64,
    /// Pending submissions, newest first.
    pub review_queue: Vec<PublicationWithAuthor>,
    pub recent_publications: Vec<PublicationWithAuthor>,
}

const REVIEW_QUEUE_LIMIT: i64 = 20;
const RECENT_LIMIT: i64 = 10;

impl DashboardSummary {
    pub async fn fetch(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        let status_counts = sqlx::query_as::<_, StatusCounts>(
            "SELECT \
                 COUNT(*) FILTER (WHERE status = 'draft')     AS draft, \
                 COUNT(*) FILTER (WHERE status = 'review')    AS review, \
                 COUNT(*) FILTER (WHERE status = 'published') AS published, \
                 COUNT(*) FILTER (WHERE status = 'excluded')  AS excluded \
             FROM publications",
        )
        .fetch_one(pool)
        .await?;

        let (total_views, total_unique_views) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COALESCE(SUM(views), 0), COALESCE(SUM(unique_views), 0) FROM publications",
        )
        .fetch_one(pool)
        .await?;

        let active_members = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM members WHERE deleted_at IS NULL",
        )
        .fetch_one(pool)
        .await?;

        let review_queue = Publication::list(
            pool,
            &PublicationFilter {
                status: Some(PublicationStatus::Review),
                limit: Some(REVIEW_QUEUE_LIMIT),
                ..Default::default()
            },
        )
        .await?;

        let recent_publications = Publication::list(
            pool,
            &PublicationFilter {
                status: Some(PublicationStatus::Published),
                limit: Some(RECENT_LIMIT),
                ..Default::default()
            },
        )
        .await?;

        Ok(DashboardSummary {
            status_counts,
            total_views,
            total_unique_views,
            active_members,
            review_queue,
            recent_publications,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::publication::queries::tests::{draft, seed_author};
    use crate::test_utils::setup_test_pool;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_summary_counts() {
        let (pool, _temp_dir) = setup_test_pool().await;
        let author = seed_author(&pool, "Kara Pinto").await;

        // One of each status
        let draft_id = Uuid::new_v4();
        Publication::create(&pool, &draft("Draft One", "news"), author, draft_id)
            .await
            .unwrap();

        let review_id = Uuid::new_v4();
        Publication::create(&pool, &draft("In Review", "news"), author, review_id)
            .await
            .unwrap();
        Publication::submit(&pool, review_id).await.unwrap();

        let published_id = Uuid::new_v4();
        Publication::create(&pool, &draft("Live Story", "news"), author, published_id)
            .await
            .unwrap();
        Publication::submit(&pool, published_id).await.unwrap();
        let live = Publication::approve(&pool, published_id).await.unwrap();
        Publication::record_view(&pool, live.slug.as_deref().unwrap(), true)
            .await
            .unwrap();
        Publication::record_view(&pool, live.slug.as_deref().unwrap(), false)
            .await
            .unwrap();

        let excluded_id = Uuid::new_v4();
        Publication::create(&pool, &draft("Pulled Story", "news"), author, excluded_id)
            .await
            .unwrap();
        Publication::submit(&pool, excluded_id).await.unwrap();
        Publication::approve(&pool, excluded_id).await.unwrap();
        Publication::exclude(&pool, excluded_id, Some("duplicate"))
            .await
            .unwrap();

        let summary = DashboardSummary::fetch(&pool).await.unwrap();
        assert_eq!(summary.status_counts.draft, 1);
        assert_eq!(summary.status_counts.review, 1);
        assert_eq!(summary.status_counts.published, 1);
        assert_eq!(summary.status_counts.excluded, 1);
        assert_eq!(summary.total_views, 2);
        assert_eq!(summary.total_unique_views, 1);
        assert_eq!(summary.active_members, 1);
        assert_eq!(summary.review_queue.len(), 1);
        assert_eq!(summary.review_queue[0].id, review_id);
        assert_eq!(summary.recent_publications.len(), 1);
        assert_eq!(summary.recent_publications[0].id, published_id);
    }
}
