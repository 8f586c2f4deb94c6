//! Editorial status transitions.
//!
//! Every transition is a single status-guarded UPDATE: the `WHERE status`
//! clause makes the check-and-move atomic, so two racing requests cannot
//! both move the same article. A zero-row update is classified afterwards
//! into "not found" or "illegal transition".
//!
//! Transitions handle their database side effects here (slug assignment,
//! counter recounts, highlight removal). Out-of-band effects such as
//! notifications, push broadcast and sitemap refresh belong to the callers.

use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use super::queries::PUBLICATION_COLUMNS;
use super::{Publication, PublicationStatus, slugify};
use crate::models::member::Member;

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("publication not found")]
    NotFound,
    #[error("cannot {attempted} a {from} publication")]
    InvalidTransition {
        from: PublicationStatus,
        attempted: &'static str,
    },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl Publication {
    /// Send a draft (or re-send a reviewed article) to the review queue.
    pub async fn submit(pool: &SqlitePool, id: Uuid) -> Result<Self, TransitionError> {
        let sql = format!(
            "UPDATE publications \
             SET status = 'review', updated_at = datetime('now', 'subsec') \
             WHERE id = ? AND status IN ('draft', 'review') \
             RETURNING {PUBLICATION_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Publication>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        match updated {
            Some(publication) => Ok(publication),
            None => Err(classify_failure(pool, id, "submit").await),
        }
    }

    /// Approve a reviewed article: assign its permanent slug, stamp
    /// `published_at` and update the author's counters.
    ///
    /// The slug derives from the title; on collision the first 8 hex chars
    /// of the publication id are appended. A previously assigned slug (from
    /// an earlier publish) is kept so public links never break.
    pub async fn approve(pool: &SqlitePool, id: Uuid) -> Result<Self, TransitionError> {
        let current = Publication::find_by_id(pool, id)
            .await?
            .ok_or(TransitionError::NotFound)?;
        if current.status != PublicationStatus::Review {
            return Err(TransitionError::InvalidTransition {
                from: current.status,
                attempted: "approve",
            });
        }

        let base = match slugify(&current.title) {
            s if s.is_empty() => short_id(id),
            s => s,
        };

        let published = match publish_with_slug(pool, id, &base).await {
            Ok(Some(publication)) => publication,
            // A racing request moved the status after the check above
            Ok(None) => return Err(classify_failure(pool, id, "approve").await),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                // Another article owns this slug; disambiguate with the id
                let fallback = format!("{base}-{}", short_id(id));
                match publish_with_slug(pool, id, &fallback).await? {
                    Some(publication) => publication,
                    None => return Err(classify_failure(pool, id, "approve").await),
                }
            }
            Err(e) => return Err(e.into()),
        };

        Member::recount_publications(pool, published.author_id).await?;
        Ok(published)
    }

    /// Take a published article off the site, keeping the row and its
    /// view counters. Removes any home-page highlight pin.
    pub async fn exclude(
        pool: &SqlitePool,
        id: Uuid,
        reason: Option<&str>,
    ) -> Result<Self, TransitionError> {
        let sql = format!(
            "UPDATE publications \
             SET status = 'excluded', deletion_reason = ?, is_highlighted = 0, \
                 updated_at = datetime('now', 'subsec') \
             WHERE id = ? AND status = 'published' \
             RETURNING {PUBLICATION_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Publication>(&sql)
            .bind(reason)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        let Some(publication) = updated else {
            return Err(classify_failure(pool, id, "exclude").await);
        };

        sqlx::query("DELETE FROM highlights WHERE publication_id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Member::recount_publications(pool, publication.author_id).await?;
        Ok(publication)
    }

    /// Put an excluded article back on the site under its original slug.
    pub async fn restore(pool: &SqlitePool, id: Uuid) -> Result<Self, TransitionError> {
        let sql = format!(
            "UPDATE publications \
             SET status = 'published', deletion_reason = NULL, \
                 updated_at = datetime('now', 'subsec') \
             WHERE id = ? AND status = 'excluded' \
             RETURNING {PUBLICATION_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Publication>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        match updated {
            Some(publication) => {
                Member::recount_publications(pool, publication.author_id).await?;
                Ok(publication)
            }
            None => Err(classify_failure(pool, id, "restore").await),
        }
    }
}

async fn publish_with_slug(
    pool: &SqlitePool,
    id: Uuid,
    slug: &str,
) -> Result<Option<Publication>, sqlx::Error> {
    let sql = format!(
        "UPDATE publications \
         SET status = 'published', \
             slug = COALESCE(slug, ?), \
             published_at = COALESCE(published_at, datetime('now', 'subsec')), \
             updated_at = datetime('now', 'subsec') \
         WHERE id = ? AND status = 'review' \
         RETURNING {PUBLICATION_COLUMNS}"
    );
    sqlx::query_as::<_, Publication>(&sql)
        .bind(slug)
        .bind(id)
        .fetch_optional(pool)
        .await
}

fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

/// Work out why a guarded transition matched zero rows.
async fn classify_failure(pool: &SqlitePool, id: Uuid, attempted: &'static str) -> TransitionError {
    match Publication::find_by_id(pool, id).await {
        Ok(Some(publication)) => TransitionError::InvalidTransition {
            from: publication.status,
            attempted,
        },
        Ok(None) => TransitionError::NotFound,
        Err(e) => TransitionError::Database(e),
    }
}
