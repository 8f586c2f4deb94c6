//! Shared application state.
//!
//! One `App` is built at startup and cloned into every axum handler via
//! `State<App>`. Construction wires the database, background tasks and
//! stateless services together and runs the startup consistency repairs.

use sqlx::SqlitePool;
use tracing::info;

use db::models::highlight::Highlight;
use db::models::member::Member;
use db::{BackupScheduler, BackupSchedulerHandle, DBService};

use super::auth::SessionService;
use super::media::MediaService;
use super::push::PushService;
use super::sitemap::{SitemapHandle, SitemapService};
use super::youtube::YoutubeCache;

#[derive(Clone)]
pub struct App {
    pub db: DBService,
    pub sessions: SessionService,
    pub push: PushService,
    pub sitemap: SitemapHandle,
    pub media: MediaService,
    pub youtube: YoutubeCache,
    pub backups: BackupSchedulerHandle,
}

impl App {
    pub async fn new() -> anyhow::Result<Self> {
        let db = DBService::new().await?;

        // Repair denormalized state that may have drifted since the last
        // clean shutdown
        Highlight::resync_flags(&db.pool).await?;
        Member::recount_all(&db.pool).await?;
        info!("Startup consistency repairs complete");

        let push = PushService::from_env(db.pool.clone())?;
        let sitemap = SitemapService::spawn(db.pool.clone());
        // Regenerate once at boot so a missing or stale sitemap heals itself
        sitemap.refresh().await;

        let backups = BackupScheduler::spawn_default(utils::assets::database_path());

        Ok(Self {
            db,
            sessions: SessionService::from_env(),
            push,
            sitemap,
            media: MediaService::new(),
            youtube: YoutubeCache::new(),
            backups,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db.pool
    }

    /// Stop background tasks and close the pool. The final checkpoint
    /// folds the WAL back into the main database file so a plain file
    /// copy of `db.sqlite` is a complete snapshot.
    pub async fn shutdown(&self) {
        self.sitemap.shutdown().await;
        self.backups.shutdown().await;

        if let Err(e) = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.db.pool)
            .await
        {
            tracing::warn!(error = %e, "Final WAL checkpoint failed");
        }
        self.db.pool.close().await;
        info!("Database closed cleanly");
    }
}
