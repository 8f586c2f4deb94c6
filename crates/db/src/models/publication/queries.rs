//! Publication CRUD and read queries. Status transitions live in
//! `lifecycle`.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{
    CreatePublication, Publication, PublicationFilter, PublicationWithAuthor, UpdatePublication,
};

pub(super) const PUBLICATION_COLUMNS: &str =
    "id, title, author_id, published_at, category, description, image_path, image_credit, \
     content, status, views, unique_views, is_highlighted, slug, deletion_reason, \
     created_at, updated_at";

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

impl Publication {
    pub async fn create(
        pool: &SqlitePool,
        data: &CreatePublication,
        author_id: Uuid,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO publications (id, title, author_id, category, description, \
                 image_credit, content) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             RETURNING {PUBLICATION_COLUMNS}"
        );
        sqlx::query_as::<_, Publication>(&sql)
            .bind(id)
            .bind(&data.title)
            .bind(author_id)
            .bind(&data.category)
            .bind(&data.description)
            .bind(&data.image_credit)
            .bind(data.content.as_deref().unwrap_or(""))
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {PUBLICATION_COLUMNS} FROM publications WHERE id = ?");
        sqlx::query_as::<_, Publication>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Public lookup: only published articles are reachable by slug.
    pub async fn find_published_by_slug(
        pool: &SqlitePool,
        slug: &str,
    ) -> Result<Option<PublicationWithAuthor>, sqlx::Error> {
        let sql = format!(
            "SELECT p.{}, m.name AS author_name \
             FROM publications p JOIN members m ON m.id = p.author_id \
             WHERE p.slug = ? AND p.status = 'published'",
            PUBLICATION_COLUMNS.replace(", ", ", p.")
        );
        sqlx::query_as::<_, PublicationWithAuthor>(&sql)
            .bind(slug)
            .fetch_optional(pool)
            .await
    }

    /// Dashboard listing with optional filters, newest first.
    pub async fn list(
        pool: &SqlitePool,
        filter: &PublicationFilter,
    ) -> Result<Vec<PublicationWithAuthor>, sqlx::Error> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT p.{}, m.name AS author_name \
             FROM publications p JOIN members m ON m.id = p.author_id WHERE 1=1",
            PUBLICATION_COLUMNS.replace(", ", ", p.")
        ));

        if let Some(status) = filter.status {
            builder.push(" AND p.status = ").push_bind(status);
        }
        if let Some(author_id) = filter.author_id {
            builder.push(" AND p.author_id = ").push_bind(author_id);
        }
        if let Some(category) = &filter.category {
            // Match either the full `main/sub` string or just the main segment
            builder
                .push(" AND (p.category = ")
                .push_bind(category.clone())
                .push(" OR p.category LIKE ")
                .push_bind(format!("{category}/%"))
                .push(")");
        }
        if let Some(q) = &filter.q {
            let pattern = format!("%{q}%");
            builder
                .push(" AND (p.title LIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.description LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        let (limit, offset) = page_bounds(filter.limit, filter.offset);
        builder
            .push(" ORDER BY p.created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        builder
            .build_query_as::<PublicationWithAuthor>()
            .fetch_all(pool)
            .await
    }

    /// Public news feed: published articles, newest first.
    pub async fn list_published(
        pool: &SqlitePool,
        category: Option<&str>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<PublicationWithAuthor>, sqlx::Error> {
        let filter = PublicationFilter {
            status: Some(super::PublicationStatus::Published),
            category: category.map(str::to_string),
            limit,
            offset,
            ..Default::default()
        };
        Self::list(pool, &filter).await
    }

    /// Public full-text-ish search over published articles.
    pub async fn search_published(
        pool: &SqlitePool,
        query: &str,
        limit: Option<i64>,
    ) -> Result<Vec<PublicationWithAuthor>, sqlx::Error> {
        let filter = PublicationFilter {
            status: Some(super::PublicationStatus::Published),
            q: Some(query.to_string()),
            limit,
            ..Default::default()
        };
        Self::list(pool, &filter).await
    }

    /// Apply a partial update. Only provided fields change.
    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdatePublication,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "UPDATE publications SET \
                 title = COALESCE(?, title), \
                 category = COALESCE(?, category), \
                 description = COALESCE(?, description), \
                 image_credit = COALESCE(?, image_credit), \
                 content = COALESCE(?, content), \
                 updated_at = datetime('now', 'subsec') \
             WHERE id = ? \
             RETURNING {PUBLICATION_COLUMNS}"
        );
        sqlx::query_as::<_, Publication>(&sql)
            .bind(&data.title)
            .bind(&data.category)
            .bind(&data.description)
            .bind(&data.image_credit)
            .bind(&data.content)
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn update_image(
        pool: &SqlitePool,
        id: Uuid,
        image_path: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE publications SET image_path = ?, updated_at = datetime('now', 'subsec') \
             WHERE id = ?",
        )
        .bind(image_path)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Count a public read. `unique_view` is client-reported (first visit).
    ///
    /// Retried because public traffic races with editorial writes.
    pub async fn record_view(
        pool: &SqlitePool,
        slug: &str,
        unique_view: bool,
    ) -> Result<u64, sqlx::Error> {
        crate::with_retry(&crate::RetryConfig::default(), "record_view", || async {
            let result = sqlx::query(
                "UPDATE publications \
                 SET views = views + 1, unique_views = unique_views + ? \
                 WHERE slug = ? AND status = 'published'",
            )
            .bind(unique_view)
            .bind(slug)
            .execute(pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await
    }

    /// All published slugs with their publish timestamps, for the sitemap.
    pub async fn published_slugs(
        pool: &SqlitePool,
    ) -> Result<Vec<(String, chrono::DateTime<chrono::Utc>)>, sqlx::Error> {
        sqlx::query_as::<_, (String, chrono::DateTime<chrono::Utc>)>(
            "SELECT slug, published_at FROM publications \
             WHERE status = 'published' AND slug IS NOT NULL AND published_at IS NOT NULL \
             ORDER BY published_at DESC",
        )
        .fetch_all(pool)
        .await
    }

    /// Remove the row permanently. Returns the deleted row so the caller can
    /// unlink stored media. The highlights pin goes with it (FK cascade).
    pub async fn delete_permanently(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("DELETE FROM publications WHERE id = ? RETURNING {PUBLICATION_COLUMNS}");
        sqlx::query_as::<_, Publication>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::super::{PublicationFilter, PublicationStatus};
    use super::*;
    use crate::models::member::{Member, MemberRole};
    use crate::test_utils::setup_test_pool;

    pub(crate) async fn seed_author(pool: &SqlitePool, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        Member::create(
            pool,
            &crate::models::member::tests::test_member(name, MemberRole::Journalist),
            id,
        )
        .await
        .expect("Failed to create author");
        id
    }

    pub(crate) fn draft(title: &str, category: &str) -> CreatePublication {
        CreatePublication {
            title: title.to_string(),
            category: category.to_string(),
            description: Some(format!("{title} description")),
            image_credit: None,
            content: Some("<p>body</p>".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_and_partial_update() {
        let (pool, _temp_dir) = setup_test_pool().await;
        let author = seed_author(&pool, "Dana Prado").await;

        let id = Uuid::new_v4();
        let publication =
            Publication::create(&pool, &draft("First Story", "news/local"), author, id)
                .await
                .expect("Failed to create publication");

        assert_eq!(publication.status, PublicationStatus::Draft);
        assert!(publication.slug.is_none());
        assert_eq!(publication.views, 0);

        let updated = Publication::update(
            &pool,
            id,
            &UpdatePublication {
                title: Some("First Story, Revised".to_string()),
                category: None,
                description: None,
                image_credit: Some("Staff photo".to_string()),
                content: None,
            },
        )
        .await
        .expect("Update failed");

        assert_eq!(updated.title, "First Story, Revised");
        // Untouched fields survive a partial update
        assert_eq!(updated.category, "news/local");
        assert_eq!(updated.content, "<p>body</p>");
        assert_eq!(updated.image_credit.as_deref(), Some("Staff photo"));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (pool, _temp_dir) = setup_test_pool().await;
        let author_a = seed_author(&pool, "Writer A").await;
        let author_b = seed_author(&pool, "Writer B").await;

        Publication::create(&pool, &draft("Council Vote", "politics/city"), author_a, Uuid::new_v4())
            .await
            .unwrap();
        Publication::create(&pool, &draft("Derby Recap", "sports/football"), author_b, Uuid::new_v4())
            .await
            .unwrap();
        Publication::create(&pool, &draft("Budget Vote", "politics/state"), author_b, Uuid::new_v4())
            .await
            .unwrap();

        let politics = Publication::list(
            &pool,
            &PublicationFilter {
                category: Some("politics".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(politics.len(), 2);

        let by_author = Publication::list(
            &pool,
            &PublicationFilter {
                author_id: Some(author_a),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(by_author.len(), 1);
        assert_eq!(by_author[0].author_name, "Writer A");

        let searched = Publication::list(
            &pool,
            &PublicationFilter {
                q: Some("vote".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(searched.len(), 2);
    }

    #[tokio::test]
    async fn test_slug_lookup_requires_published() {
        let (pool, _temp_dir) = setup_test_pool().await;
        let author = seed_author(&pool, "Eli Nunes").await;

        let id = Uuid::new_v4();
        Publication::create(&pool, &draft("Hidden Draft", "news"), author, id)
            .await
            .unwrap();
        sqlx::query("UPDATE publications SET slug = 'hidden-draft' WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();

        assert!(
            Publication::find_published_by_slug(&pool, "hidden-draft")
                .await
                .unwrap()
                .is_none()
        );

        // Drafts never accrue views either
        assert_eq!(
            Publication::record_view(&pool, "hidden-draft", true)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_permanent_delete_returns_row() {
        let (pool, _temp_dir) = setup_test_pool().await;
        let author = seed_author(&pool, "Gil Horta").await;

        let id = Uuid::new_v4();
        Publication::create(&pool, &draft("Short Lived", "news"), author, id)
            .await
            .unwrap();
        Publication::update_image(&pool, id, "uploads/short-lived.jpg")
            .await
            .unwrap();

        let deleted = Publication::delete_permanently(&pool, id)
            .await
            .unwrap()
            .expect("Row should exist");
        assert_eq!(deleted.image_path.as_deref(), Some("uploads/short-lived.jpg"));

        assert!(Publication::find_by_id(&pool, id).await.unwrap().is_none());
        assert!(
            Publication::delete_permanently(&pool, id)
                .await
                .unwrap()
                .is_none()
        );
    }
}
