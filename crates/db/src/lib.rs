use std::{path::Path, str::FromStr, time::Duration};

use sqlx::{
    Error, Executor, Pool, Sqlite,
    sqlite::{
        SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions,
        SqliteSynchronous,
    },
};
use tracing::{error, info, warn};
use utils::assets::database_path;

pub mod backup;
pub mod backup_scheduler;
pub mod models;
pub mod retry;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use backup::{BackupError, BackupInfo, BackupService};
pub use backup_scheduler::{BackupScheduler, BackupSchedulerConfig, BackupSchedulerHandle};
pub use retry::{RetryConfig, is_retryable_error, with_retry};

// ============================================================================
// Connection Pool Configuration
// ============================================================================

/// Default maximum connections in the pool.
/// SQLite benefits from limited connections due to single-writer model.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Minimum idle connections to maintain.
const DEFAULT_MIN_CONNECTIONS: u32 = 2;

/// Connection acquisition timeout in seconds.
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Idle connection timeout in seconds (10 minutes).
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Get max connections from environment or use default.
fn get_max_connections() -> u32 {
    std::env::var("TLU_SQLITE_MAX_CONNECTIONS")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|&n| n > 0 && n <= 100)
        .unwrap_or(DEFAULT_MAX_CONNECTIONS)
}

/// Apply performance and reliability pragmas to a SQLite connection.
/// These pragmas are applied on every new connection via `after_connect`.
///
/// CRITICAL: The `synchronous` pragma must be set AFTER `mmap_size` because
/// enabling mmap can affect how SQLite handles fsync. Without explicit
/// synchronous setting after mmap, disk I/O errors (code 522) can occur
/// under heavy write load.
async fn apply_performance_pragmas(conn: &mut SqliteConnection) -> Result<(), Error> {
    // temp_store = MEMORY (2)
    conn.execute("PRAGMA temp_store = 2").await?;

    // mmap_size: smaller in dev to reduce I/O pressure
    #[cfg(debug_assertions)]
    conn.execute("PRAGMA mmap_size = 67108864").await?; // 64MB

    #[cfg(not(debug_assertions))]
    conn.execute("PRAGMA mmap_size = 268435456").await?; // 256MB

    conn.execute("PRAGMA synchronous = NORMAL").await?;

    // cache_size = -64000 (64MB, negative means KB)
    conn.execute("PRAGMA cache_size = -64000").await?;

    // Checkpoint every 2000 pages (~8MB) instead of the default 1000 to
    // reduce checkpoint frequency under write load.
    conn.execute("PRAGMA wal_autocheckpoint = 2000").await?;

    // Article/member writes rely on FK enforcement at the connection level.
    conn.execute("PRAGMA foreign_keys = ON").await?;

    Ok(())
}

// ============================================================================
// Database Integrity Check
// ============================================================================

/// Check database integrity using PRAGMA quick_check.
///
/// This is faster than a full integrity_check and catches most corruption
/// issues. Runs on a throwaway single-connection pool BEFORE the main pool
/// is created.
async fn check_database_integrity(db_path: &Path) -> Result<(), String> {
    if !db_path.exists() {
        return Ok(()); // No database to check
    }

    let options = SqliteConnectOptions::new().filename(db_path).read_only(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| format!("Failed to open database for integrity check: {}", e))?;

    let result: String = sqlx::query_scalar("PRAGMA quick_check")
        .fetch_one(&pool)
        .await
        .map_err(|e| format!("Failed to run integrity check: {}", e))?;

    pool.close().await;

    if result != "ok" {
        return Err(format!("Database integrity check failed: {}", result));
    }

    Ok(())
}

/// Attempt to recover from database corruption by restoring the most recent
/// backup.
///
/// Returns Ok(true) if recovery was successful, Ok(false) if no backup was
/// available, or Err if recovery failed.
async fn attempt_corruption_recovery(db_path: &Path) -> Result<bool, std::io::Error> {
    let Some(backup_path) = BackupService::newest_backup() else {
        return Ok(false);
    };

    warn!(
        backup = %backup_path.display(),
        "Attempting automatic recovery from backup"
    );

    let backup_data = std::fs::read(&backup_path)?;
    BackupService::restore_from_data(db_path, &backup_data)?;

    match check_database_integrity(db_path).await {
        Ok(()) => {
            info!(
                backup = %backup_path.display(),
                "Database restored and verified healthy"
            );
            Ok(true)
        }
        Err(msg) => {
            error!(
                backup = %backup_path.display(),
                error = %msg,
                "Restored database is also corrupted"
            );
            Err(std::io::Error::other(format!(
                "Restored backup is also corrupted: {}",
                msg
            )))
        }
    }
}

#[derive(Clone)]
pub struct DBService {
    pub pool: Pool<Sqlite>,
}

impl DBService {
    pub async fn new() -> Result<DBService, Error> {
        let db_path = database_path();

        // Check database integrity BEFORE creating the pool
        match check_database_integrity(&db_path).await {
            Ok(()) => {
                info!("Database integrity check passed");
            }
            Err(msg) => {
                error!(error = %msg, "DATABASE CORRUPTION DETECTED");

                match attempt_corruption_recovery(&db_path).await {
                    Ok(true) => {
                        info!("Automatic recovery from backup successful");
                    }
                    Ok(false) => {
                        error!("No backup available for recovery. Database is corrupted.");
                        return Err(Error::Protocol(msg));
                    }
                    Err(e) => {
                        error!(error = ?e, "Automatic recovery failed");
                        return Err(Error::Protocol(format!(
                            "Database corruption detected and recovery failed: {}",
                            msg
                        )));
                    }
                }
            }
        }

        let database_url = format!("sqlite://{}", db_path.to_string_lossy());
        let max_connections = get_max_connections();

        tracing::info!(
            max_connections = max_connections,
            min_connections = DEFAULT_MIN_CONNECTIONS,
            "Initializing SQLite connection pool"
        );

        let options = SqliteConnectOptions::from_str(&database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(DEFAULT_MIN_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS))
            .idle_timeout(Some(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS)))
            .after_connect(|conn, _meta| {
                Box::pin(async move { apply_performance_pragmas(conn).await })
            })
            .connect_with(options)
            .await?;

        // Only create a pre-migration backup if there are migrations to run
        let has_pending = has_pending_migrations(&pool).await;

        if has_pending {
            info!("Pending migrations detected, creating pre-migration backup");
            let db_path_for_backup = db_path.clone();
            let backup_result = tokio::task::spawn_blocking(move || {
                BackupService::backup_before_migration(&db_path_for_backup)
            })
            .await;

            match backup_result {
                Err(e) => warn!(error = ?e, "Backup task panicked"),
                Ok(Err(e)) => warn!(error = ?e, "Failed to create pre-migration backup"),
                Ok(Ok(_)) => {}
            }

            run_migrations_with_fk_disabled(&database_url).await?;
        }

        // Always cleanup old backups in the background (this is fast)
        tokio::spawn(async move {
            if let Err(e) =
                tokio::task::spawn_blocking(move || BackupService::cleanup_old_backups()).await
            {
                warn!(error = ?e, "Failed to cleanup old backups");
            }
        });

        Ok(DBService { pool })
    }
}

/// Check if there are pending migrations to run.
///
/// Compares the migrations in the codebase against the `_sqlx_migrations`
/// table to determine if any migrations need to be applied.
async fn has_pending_migrations(pool: &Pool<Sqlite>) -> bool {
    let migrator = sqlx::migrate!("./migrations");
    let applied: Vec<i64> = match sqlx::query_scalar::<_, i64>(
        "SELECT version FROM _sqlx_migrations ORDER BY version",
    )
    .fetch_all(pool)
    .await
    {
        Ok(versions) => versions,
        Err(_) => {
            // Table doesn't exist or query failed - assume we need migrations
            return true;
        }
    };

    for migration in migrator.iter() {
        if !applied.contains(&migration.version) {
            return true;
        }
    }

    false
}

/// Run migrations with foreign keys disabled.
///
/// SQLite's PRAGMA foreign_keys cannot be changed inside a transaction, and
/// SQLx wraps migrations in transactions. To prevent CASCADE deletes during
/// table recreation migrations, foreign keys are disabled at the connection
/// level BEFORE migrations run, on a dedicated single-connection pool.
async fn run_migrations_with_fk_disabled(database_url: &str) -> Result<(), Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS));

    let migration_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("PRAGMA foreign_keys = OFF").await?;
                Ok(())
            })
        })
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&migration_pool).await?;

    // Pool is dropped here, connection closed
    Ok(())
}
