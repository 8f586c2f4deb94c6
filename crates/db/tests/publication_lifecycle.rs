//! End-to-end exercise of the editorial workflow against a real database
//! file: draft through publication, public visibility, exclusion and
//! restore, finishing with a permanent delete.

use db::models::dashboard::DashboardSummary;
use db::models::highlight::Highlight;
use db::models::member::{CreateMember, Member, MemberRole};
use db::models::notification::Notification;
use db::models::publication::{
    CreatePublication, Publication, PublicationStatus, TransitionError,
};
use db::test_utils::setup_test_pool;
use sqlx::SqlitePool;
use uuid::Uuid;

async fn seed_member(pool: &SqlitePool, name: &str, role: MemberRole) -> Uuid {
    let id = Uuid::new_v4();
    Member::create(
        pool,
        &CreateMember {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            password_digest: "sha256$00$00".to_string(),
            role: Some(role),
            bio: None,
            is_team_member: None,
        },
        id,
    )
    .await
    .expect("Failed to create member");
    id
}

fn article(title: &str) -> CreatePublication {
    CreatePublication {
        title: title.to_string(),
        category: "news/local".to_string(),
        description: Some("An article".to_string()),
        image_credit: None,
        content: Some("<p>Lorem ipsum</p>".to_string()),
    }
}

#[tokio::test]
async fn editorial_workflow_end_to_end() {
    let (pool, _temp_dir) = setup_test_pool().await;

    let admin = seed_member(&pool, "News Admin", MemberRole::Admin).await;
    let author = seed_member(&pool, "Staff Writer", MemberRole::Journalist).await;

    // Draft
    let id = Uuid::new_v4();
    let publication = Publication::create(&pool, &article("Bridge Reopens Downtown"), author, id)
        .await
        .unwrap();
    assert_eq!(publication.status, PublicationStatus::Draft);

    // Submit notifies the admin role (the caller's responsibility, mirrored
    // here the way the HTTP layer does it)
    Publication::submit(&pool, id).await.unwrap();
    Notification::create_for_role(
        &pool,
        MemberRole::Admin,
        "New submission",
        "Bridge Reopens Downtown is awaiting review",
    )
    .await
    .unwrap();

    let admin_feed = Notification::list_for(&pool, admin, MemberRole::Admin, 10)
        .await
        .unwrap();
    assert_eq!(admin_feed.len(), 1);

    // Approve: slug, timestamp, counters
    let published = Publication::approve(&pool, id).await.unwrap();
    let slug = published.slug.as_deref().expect("Slug assigned on approval");
    assert_eq!(slug, "bridge-reopens-downtown");
    assert!(published.published_at.is_some());
    assert_eq!(
        Member::find_by_id(&pool, author)
            .await
            .unwrap()
            .unwrap()
            .published_count,
        1
    );

    // Public surface sees it, and views accumulate
    let public = Publication::find_published_by_slug(&pool, slug)
        .await
        .unwrap()
        .expect("Published article is publicly visible");
    assert_eq!(public.author_name, "Staff Writer");

    Publication::record_view(&pool, slug, true).await.unwrap();
    Publication::record_view(&pool, slug, false).await.unwrap();

    // Highlight it, then exclude it; the pin must not survive
    Highlight::pin(&pool, 1, id).await.unwrap();
    let excluded = Publication::exclude(&pool, id, Some("superseded by follow-up"))
        .await
        .unwrap();
    assert_eq!(excluded.status, PublicationStatus::Excluded);
    assert!(!excluded.is_highlighted);
    assert!(
        Highlight::list_with_publications(&pool)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        Publication::find_published_by_slug(&pool, slug)
            .await
            .unwrap()
            .is_none()
    );

    // Restore brings it back under the same slug, with views intact
    let restored = Publication::restore(&pool, id).await.unwrap();
    assert_eq!(restored.slug.as_deref(), Some(slug));
    assert_eq!(restored.views, 2);
    assert_eq!(restored.unique_views, 1);

    let summary = DashboardSummary::fetch(&pool).await.unwrap();
    assert_eq!(summary.status_counts.published, 1);
    assert_eq!(summary.total_views, 2);
    assert_eq!(summary.active_members, 2);

    // Excluding again, then a permanent delete removes every trace
    Publication::exclude(&pool, id, None).await.unwrap();
    let deleted = Publication::delete_permanently(&pool, id)
        .await
        .unwrap()
        .expect("Row existed");
    assert_eq!(deleted.id, id);
    assert!(Publication::find_by_id(&pool, id).await.unwrap().is_none());

    // Counters reflect the deletion after a recount
    Member::recount_publications(&pool, author).await.unwrap();
    let author_row = Member::find_by_id(&pool, author).await.unwrap().unwrap();
    assert_eq!(author_row.published_count, 0);
    assert_eq!(author_row.excluded_count, 0);
}

#[tokio::test]
async fn approval_requires_review_status() {
    let (pool, _temp_dir) = setup_test_pool().await;
    let author = seed_member(&pool, "Solo Writer", MemberRole::Journalist).await;

    let id = Uuid::new_v4();
    Publication::create(&pool, &article("Not Ready"), author, id)
        .await
        .unwrap();

    match Publication::approve(&pool, id).await {
        Err(TransitionError::InvalidTransition { from, attempted }) => {
            assert_eq!(from, PublicationStatus::Draft);
            assert_eq!(attempted, "approve");
        }
        other => panic!("Expected invalid transition, got {other:?}"),
    }
}
