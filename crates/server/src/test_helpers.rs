//! Fixtures for handler tests: an `App` wired to a throwaway database,
//! with background tasks kept inert.

use std::time::Duration;

use db::models::member::{CreateMember, Member, MemberRole};
use db::models::publication::{CreatePublication, Publication};
use db::test_utils::setup_test_pool;
use db::{BackupScheduler, BackupSchedulerConfig, DBService};
use services::services::app::App;
use services::services::auth::SessionService;
use services::services::media::MediaService;
use services::services::push::PushService;
use services::services::sitemap::SitemapService;
use services::services::youtube::YoutubeCache;
use tempfile::TempDir;
use uuid::Uuid;

use crate::middleware::CurrentUser;

/// Build an `App` over a temp database. The sitemap debounce is stretched
/// far past any test's lifetime so refreshes never touch the filesystem,
/// and the backup scheduler is disabled outright.
pub(crate) async fn test_app() -> (App, TempDir) {
    let (pool, temp_dir) = setup_test_pool().await;

    let push = PushService::from_env(pool.clone()).expect("Failed to build push service");
    let sitemap = SitemapService::spawn_with(
        pool.clone(),
        temp_dir.path().join("sitemap.xml"),
        "http://127.0.0.1:8080".to_string(),
        Duration::from_secs(3600),
    );
    let backups = BackupScheduler::spawn(
        temp_dir.path().join("db.sqlite"),
        BackupSchedulerConfig {
            interval_hours: 4,
            enabled: false,
        },
    );

    let app = App {
        db: DBService { pool },
        sessions: SessionService::new(b"handler-test-secret"),
        push,
        sitemap,
        media: MediaService::with_root(temp_dir.path().join("uploads")),
        youtube: YoutubeCache::new(),
        backups,
    };
    (app, temp_dir)
}

pub(crate) async fn seed_user(app: &App, name: &str, role: MemberRole) -> CurrentUser {
    let id = Uuid::new_v4();
    let member = Member::create(
        app.pool(),
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
    CurrentUser(member)
}

pub(crate) async fn seed_draft(app: &App, author: &CurrentUser, title: &str) -> Publication {
    Publication::create(
        app.pool(),
        &CreatePublication {
            title: title.to_string(),
            category: "news/local".to_string(),
            description: Some("An article".to_string()),
            image_credit: None,
            content: None,
        },
        author.0.id,
        Uuid::new_v4(),
    )
    .await
    .expect("Failed to create draft")
}
