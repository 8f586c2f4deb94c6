//! Debounced sitemap regeneration.
//!
//! Publishing events request a refresh through an mpsc channel; the
//! background task waits for a quiet period so bursts of editorial
//! activity produce a single rebuild. A failed write re-arms the timer
//! instead of dropping the request.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use db::models::publication::Publication;

/// How long to wait after the last refresh request before rebuilding.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(30);

enum SitemapCommand {
    Refresh,
    Shutdown,
}

#[derive(Clone)]
pub struct SitemapHandle {
    tx: mpsc::Sender<SitemapCommand>,
}

impl SitemapHandle {
    /// Request a rebuild. Coalesced with other pending requests.
    pub async fn refresh(&self) {
        if self.tx.send(SitemapCommand::Refresh).await.is_err() {
            error!("Sitemap task is gone, refresh request dropped");
        }
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(SitemapCommand::Shutdown).await;
    }
}

pub struct SitemapService;

impl SitemapService {
    pub fn spawn(pool: SqlitePool) -> SitemapHandle {
        Self::spawn_with(
            pool,
            utils::assets::sitemap_path(),
            utils::assets::site_url(),
            DEFAULT_QUIET_PERIOD,
        )
    }

    pub fn spawn_with(
        pool: SqlitePool,
        output_path: PathBuf,
        base_url: String,
        quiet_period: Duration,
    ) -> SitemapHandle {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(run(pool, output_path, base_url, quiet_period, rx));
        SitemapHandle { tx }
    }
}

async fn run(
    pool: SqlitePool,
    output_path: PathBuf,
    base_url: String,
    quiet_period: Duration,
    mut rx: mpsc::Receiver<SitemapCommand>,
) {
    info!(path = %output_path.display(), "Sitemap task started");

    'outer: while let Some(command) = rx.recv().await {
        if matches!(command, SitemapCommand::Shutdown) {
            break;
        }

        // Debounce: keep pushing the deadline while requests arrive
        let mut deadline = tokio::time::Instant::now() + quiet_period;
        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(SitemapCommand::Refresh) => {
                        deadline = tokio::time::Instant::now() + quiet_period;
                    }
                    Some(SitemapCommand::Shutdown) | None => break 'outer,
                },
                _ = tokio::time::sleep_until(deadline) => {
                    match regenerate(&pool, &output_path, &base_url).await {
                        Ok(count) => {
                            debug!(entries = count, "Sitemap regenerated");
                            break;
                        }
                        Err(e) => {
                            // Keep the request alive and try again after
                            // another quiet period
                            error!(error = %e, "Sitemap regeneration failed, re-scheduling");
                            deadline = tokio::time::Instant::now() + quiet_period;
                        }
                    }
                }
            }
        }
    }

    info!("Sitemap task stopped");
}

async fn regenerate(
    pool: &SqlitePool,
    output_path: &PathBuf,
    base_url: &str,
) -> anyhow::Result<usize> {
    let entries = Publication::published_slugs(pool).await?;
    let xml = build_sitemap(base_url, &entries);

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // Write-then-rename so readers never see a half-written file
    let tmp_path = output_path.with_extension("xml.tmp");
    std::fs::write(&tmp_path, &xml)?;
    std::fs::rename(&tmp_path, output_path)?;

    Ok(entries.len())
}

/// Render the sitemap XML: the home page first, then every published
/// article with its publish date as `lastmod`.
pub fn build_sitemap(base_url: &str, entries: &[(String, DateTime<Utc>)]) -> String {
    let mut xml = String::with_capacity(256 + entries.len() * 128);
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");

    xml.push_str("  <url>\n");
    xml.push_str(&format!("    <loc>{base_url}/</loc>\n"));
    xml.push_str("  </url>\n");

    for (slug, published_at) in entries {
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{base_url}/news/{slug}</loc>\n"));
        xml.push_str(&format!(
            "    <lastmod>{}</lastmod>\n",
            published_at.format("%Y-%m-%d")
        ));
        xml.push_str("  </url>\n");
    }

    xml.push_str("</urlset>\n");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::test_utils::setup_test_pool;
    use uuid::Uuid;

    #[test]
    fn test_build_sitemap() {
        let published = DateTime::parse_from_rfc3339("2026-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let xml = build_sitemap(
            "https://news.example.com",
            &[("city-hall-opens".to_string(), published)],
        );

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<loc>https://news.example.com/</loc>"));
        assert!(xml.contains("<loc>https://news.example.com/news/city-hall-opens</loc>"));
        assert!(xml.contains("<lastmod>2026-05-01</lastmod>"));
    }

    #[test]
    fn test_build_sitemap_empty() {
        let xml = build_sitemap("https://news.example.com", &[]);
        assert!(xml.contains("<loc>https://news.example.com/</loc>"));
        assert!(!xml.contains("/news/"));
    }

    #[tokio::test]
    async fn test_refresh_requests_coalesce() {
        let (pool, temp_dir) = setup_test_pool().await;

        // One published article
        let author = Uuid::new_v4();
        db::models::member::Member::create(
            &pool,
            &db::models::member::CreateMember {
                name: "Sitemap Writer".to_string(),
                email: "sitemap.writer@example.com".to_string(),
                password_digest: "sha256$00$00".to_string(),
                role: None,
                bio: None,
                is_team_member: None,
            },
            author,
        )
        .await
        .unwrap();
        let id = Uuid::new_v4();
        Publication::create(
            &pool,
            &db::models::publication::CreatePublication {
                title: "Mapped Story".to_string(),
                category: "news".to_string(),
                description: None,
                image_credit: None,
                content: None,
            },
            author,
            id,
        )
        .await
        .unwrap();
        Publication::submit(&pool, id).await.unwrap();
        Publication::approve(&pool, id).await.unwrap();

        let output = temp_dir.path().join("sitemap.xml");
        let handle = SitemapService::spawn_with(
            pool.clone(),
            output.clone(),
            "https://news.example.com".to_string(),
            Duration::from_millis(50),
        );

        // A burst of requests produces one rebuild after the quiet period
        handle.refresh().await;
        handle.refresh().await;
        handle.refresh().await;
        assert!(!output.exists());

        tokio::time::sleep(Duration::from_millis(300)).await;
        let xml = std::fs::read_to_string(&output).expect("Sitemap should exist");
        assert!(xml.contains("/news/mapped-story</loc>"));

        handle.shutdown().await;
    }
}
