//! Home-page highlights: three fixed slots pinning published articles.
//!
//! The highlights table is the source of truth; the denormalized
//! `publications.is_highlighted` flag exists for cheap public listings and
//! is resynchronized after every write that can change it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use super::publication::{Publication, PublicationStatus, PublicationWithAuthor};

pub const HIGHLIGHT_SLOTS: i64 = 3;

#[derive(Debug, Error)]
pub enum HighlightError {
    #[error("slot must be between 1 and {HIGHLIGHT_SLOTS}")]
    InvalidSlot(i64),
    #[error("publication not found")]
    PublicationNotFound,
    #[error("only published articles can be highlighted")]
    NotPublished(PublicationStatus),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Highlight {
    pub slot: i64,
    pub publication_id: Uuid,
    pub pinned_at: DateTime<Utc>,
}

/// A filled slot joined with its article, for the home page.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HighlightedPublication {
    pub slot: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub publication: PublicationWithAuthor,
}

impl Highlight {
    /// Pin a published article into a slot, replacing any occupant. An
    /// article already pinned elsewhere moves to the new slot.
    pub async fn pin(
        pool: &SqlitePool,
        slot: i64,
        publication_id: Uuid,
    ) -> Result<Self, HighlightError> {
        if !(1..=HIGHLIGHT_SLOTS).contains(&slot) {
            return Err(HighlightError::InvalidSlot(slot));
        }

        let publication = Publication::find_by_id(pool, publication_id)
            .await?
            .ok_or(HighlightError::PublicationNotFound)?;
        if publication.status != PublicationStatus::Published {
            return Err(HighlightError::NotPublished(publication.status));
        }

        let mut tx = pool.begin().await?;
        // The UNIQUE constraint on publication_id means a re-pin must drop
        // the old slot first
        sqlx::query("DELETE FROM highlights WHERE publication_id = ?")
            .bind(publication_id)
            .execute(&mut *tx)
            .await?;
        let highlight = sqlx::query_as::<_, Highlight>(
            "INSERT INTO highlights (slot, publication_id, pinned_at) \
             VALUES (?, ?, datetime('now', 'subsec')) \
             ON CONFLICT(slot) DO UPDATE SET \
                 publication_id = excluded.publication_id, \
                 pinned_at = excluded.pinned_at \
             RETURNING slot, publication_id, pinned_at",
        )
        .bind(slot)
        .bind(publication_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Self::resync_flags(pool).await?;
        Ok(highlight)
    }

    /// Empty a slot. Returns false when the slot was already empty.
    pub async fn unpin(pool: &SqlitePool, slot: i64) -> Result<bool, HighlightError> {
        if !(1..=HIGHLIGHT_SLOTS).contains(&slot) {
            return Err(HighlightError::InvalidSlot(slot));
        }
        let result = sqlx::query("DELETE FROM highlights WHERE slot = ?")
            .bind(slot)
            .execute(pool)
            .await?;
        Self::resync_flags(pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Filled slots with their articles, slot order.
    pub async fn list_with_publications(
        pool: &SqlitePool,
    ) -> Result<Vec<HighlightedPublication>, sqlx::Error> {
        sqlx::query_as::<_, HighlightedPublication>(
            "SELECT h.slot, p.id, p.title, p.author_id, p.published_at, p.category, \
                    p.description, p.image_path, p.image_credit, p.content, p.status, \
                    p.views, p.unique_views, p.is_highlighted, p.slug, p.deletion_reason, \
                    p.created_at, p.updated_at, m.name AS author_name \
             FROM highlights h \
             JOIN publications p ON p.id = h.publication_id \
             JOIN members m ON m.id = p.author_id \
             WHERE p.status = 'published' \
             ORDER BY h.slot",
        )
        .fetch_all(pool)
        .await
    }

    /// Rewrite `publications.is_highlighted` from the highlights table.
    ///
    /// Safe to run at any time; also executed at startup to repair drift.
    pub async fn resync_flags(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE publications SET is_highlighted = \
                 EXISTS (SELECT 1 FROM highlights WHERE publication_id = publications.id) \
             WHERE is_highlighted != \
                 EXISTS (SELECT 1 FROM highlights WHERE publication_id = publications.id)",
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::publication::queries::tests::{draft, seed_author};
    use crate::test_utils::setup_test_pool;

    async fn published(pool: &SqlitePool, author: Uuid, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        Publication::create(pool, &draft(title, "news"), author, id)
            .await
            .unwrap();
        Publication::submit(pool, id).await.unwrap();
        Publication::approve(pool, id).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_pin_replaces_and_moves() {
        let (pool, _temp_dir) = setup_test_pool().await;
        let author = seed_author(&pool, "Hugo Reis").await;
        let a = published(&pool, author, "Story A").await;
        let b = published(&pool, author, "Story B").await;

        Highlight::pin(&pool, 1, a).await.unwrap();
        assert!(
            Publication::find_by_id(&pool, a)
                .await
                .unwrap()
                .unwrap()
                .is_highlighted
        );

        // Pinning B into slot 1 evicts A
        Highlight::pin(&pool, 1, b).await.unwrap();
        let highlights = Highlight::list_with_publications(&pool).await.unwrap();
        assert_eq!(highlights.len(), 1);
        assert_eq!(highlights[0].publication.id, b);
        assert!(
            !Publication::find_by_id(&pool, a)
                .await
                .unwrap()
                .unwrap()
                .is_highlighted
        );

        // Moving B to slot 2 leaves slot 1 empty instead of duplicating
        Highlight::pin(&pool, 2, b).await.unwrap();
        let highlights = Highlight::list_with_publications(&pool).await.unwrap();
        assert_eq!(highlights.len(), 1);
        assert_eq!(highlights[0].slot, 2);
    }

    #[tokio::test]
    async fn test_pin_validations() {
        let (pool, _temp_dir) = setup_test_pool().await;
        let author = seed_author(&pool, "Ivo Dias").await;

        assert!(matches!(
            Highlight::pin(&pool, 0, Uuid::new_v4()).await,
            Err(HighlightError::InvalidSlot(0))
        ));
        assert!(matches!(
            Highlight::pin(&pool, 4, Uuid::new_v4()).await,
            Err(HighlightError::InvalidSlot(4))
        ));
        assert!(matches!(
            Highlight::pin(&pool, 1, Uuid::new_v4()).await,
            Err(HighlightError::PublicationNotFound)
        ));

        let draft_id = Uuid::new_v4();
        Publication::create(&pool, &draft("Unready", "news"), author, draft_id)
            .await
            .unwrap();
        assert!(matches!(
            Highlight::pin(&pool, 1, draft_id).await,
            Err(HighlightError::NotPublished(PublicationStatus::Draft))
        ));
    }

    #[tokio::test]
    async fn test_unpin_and_exclusion_clear_flag() {
        let (pool, _temp_dir) = setup_test_pool().await;
        let author = seed_author(&pool, "Joana Luz").await;
        let a = published(&pool, author, "Front Page").await;
        let b = published(&pool, author, "Second Page").await;

        Highlight::pin(&pool, 1, a).await.unwrap();
        Highlight::pin(&pool, 2, b).await.unwrap();

        assert!(Highlight::unpin(&pool, 1).await.unwrap());
        assert!(!Highlight::unpin(&pool, 1).await.unwrap());
        assert!(
            !Publication::find_by_id(&pool, a)
                .await
                .unwrap()
                .unwrap()
                .is_highlighted
        );

        // Excluding a pinned article removes its pin too
        Publication::exclude(&pool, b, Some("retracted"))
            .await
            .unwrap();
        assert!(
            Highlight::list_with_publications(&pool)
                .await
                .unwrap()
                .is_empty()
        );
        assert!(
            !Publication::find_by_id(&pool, b)
                .await
                .unwrap()
                .unwrap()
                .is_highlighted
        );
    }
}
