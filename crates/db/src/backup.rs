//! Database backup utilities.
//!
//! Implements the periodic SQLite file-copy backup job: timestamped copies of
//! the database (plus WAL/SHM companions) land in the backup directory, old
//! copies are pruned by retention count, and the newest copy can be restored
//! over a corrupted database.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use utils::assets::backup_dir;

/// Information about a database backup file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupInfo {
    /// Filename of the backup (e.g. "db_backup_20250101_100000.sqlite")
    pub filename: String,
    /// When the backup was created
    pub created_at: DateTime<Utc>,
    /// Size of the backup file in bytes
    pub size_bytes: u64,
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("database not found at {0}")]
    DatabaseNotFound(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Number of backups to retain (older ones are automatically deleted)
const DEFAULT_BACKUP_RETENTION: usize = 5;

/// Retention used by the periodic scheduler, overridable via env.
pub fn scheduled_retention() -> usize {
    std::env::var("TLU_BACKUP_RETENTION")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_BACKUP_RETENTION)
}

/// Service for managing database backups
pub struct BackupService;

impl BackupService {
    /// Create a timestamped backup of the database before migrations.
    ///
    /// Returns the path to the backup file if created, or None if no database
    /// exists yet.
    pub fn backup_before_migration(db_path: &Path) -> Result<Option<PathBuf>, std::io::Error> {
        if !db_path.exists() {
            info!("No existing database to backup - skipping pre-migration backup");
            return Ok(None);
        }

        let info = Self::copy_database(db_path)?;
        let backup_path = backup_dir().join(&info.filename);
        info!(backup_path = %backup_path.display(), "Pre-migration database backup created");
        Ok(Some(backup_path))
    }

    /// Create a new backup of the database.
    ///
    /// Creates a timestamped copy in the backup directory and returns
    /// information about it. WAL and SHM files are copied alongside so the
    /// backup captures the complete database state.
    pub fn create_backup(db_path: &Path) -> Result<BackupInfo, BackupError> {
        if !db_path.exists() {
            return Err(BackupError::DatabaseNotFound(db_path.to_path_buf()));
        }
        Ok(Self::copy_database(db_path)?)
    }

    fn copy_database(db_path: &Path) -> Result<BackupInfo, std::io::Error> {
        let backup_directory = backup_dir();
        std::fs::create_dir_all(&backup_directory)?;

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let filename = format!("db_backup_{}.sqlite", timestamp);
        let backup_path = backup_directory.join(&filename);

        std::fs::copy(db_path, &backup_path)?;

        // Companion files carry not-yet-checkpointed writes
        let wal_path = db_path.with_extension("sqlite-wal");
        if wal_path.exists() {
            let wal_backup = backup_directory.join(format!("db_backup_{}.sqlite-wal", timestamp));
            std::fs::copy(&wal_path, &wal_backup)?;
        }

        let shm_path = db_path.with_extension("sqlite-shm");
        if shm_path.exists() {
            let shm_backup = backup_directory.join(format!("db_backup_{}.sqlite-shm", timestamp));
            std::fs::copy(&shm_path, &shm_backup)?;
        }

        let meta = std::fs::metadata(&backup_path)?;

        Ok(BackupInfo {
            filename,
            created_at: Utc::now(),
            size_bytes: meta.len(),
        })
    }

    /// Clean up old backups, keeping only the most recent N.
    ///
    /// Uses the default retention count.
    pub fn cleanup_old_backups() -> Result<(), std::io::Error> {
        Self::cleanup_old_backups_with_retention(DEFAULT_BACKUP_RETENTION)
    }

    /// Clean up old backups with a custom retention count.
    pub fn cleanup_old_backups_with_retention(keep_count: usize) -> Result<(), std::io::Error> {
        let mut backups = Self::backup_entries()?;

        // Sort by modification time (newest first)
        backups.sort_by(|a, b| {
            let a_time = a.metadata().and_then(|m| m.modified()).ok();
            let b_time = b.metadata().and_then(|m| m.modified()).ok();
            b_time.cmp(&a_time)
        });

        for old_backup in backups.into_iter().skip(keep_count) {
            let path = old_backup.path();

            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = ?e, "Failed to remove old backup");
                continue;
            }

            // Remove associated WAL/SHM files too
            let wal = path.with_extension("sqlite-wal");
            if wal.exists() {
                let _ = std::fs::remove_file(&wal);
            }
            let shm = path.with_extension("sqlite-shm");
            if shm.exists() {
                let _ = std::fs::remove_file(&shm);
            }

            info!(path = %path.display(), "Removed old backup");
        }

        Ok(())
    }

    /// List all available backup files, sorted newest first.
    pub fn list_backups() -> Result<Vec<BackupInfo>, std::io::Error> {
        let mut backups: Vec<BackupInfo> = Self::backup_entries()?
            .into_iter()
            .filter_map(|e| {
                let meta = e.metadata().ok()?;
                Some(BackupInfo {
                    filename: e.file_name().to_string_lossy().to_string(),
                    created_at: DateTime::from(meta.modified().ok()?),
                    size_bytes: meta.len(),
                })
            })
            .collect();

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(backups)
    }

    /// Path of the most recent backup, if any exist.
    pub fn newest_backup() -> Option<PathBuf> {
        let mut backups = Self::backup_entries().ok()?;
        if backups.is_empty() {
            return None;
        }

        backups.sort_by(|a, b| {
            let a_time = a.metadata().and_then(|m| m.modified()).ok();
            let b_time = b.metadata().and_then(|m| m.modified()).ok();
            b_time.cmp(&a_time)
        });

        Some(backups[0].path())
    }

    /// Replace the database file with the given backup contents.
    ///
    /// Stale WAL/SHM companions of the old database are removed so SQLite
    /// doesn't replay writes from the corrupted generation.
    pub fn restore_from_data(db_path: &Path, data: &[u8]) -> Result<(), std::io::Error> {
        let wal = db_path.with_extension("sqlite-wal");
        if wal.exists() {
            let _ = std::fs::remove_file(&wal);
        }
        let shm = db_path.with_extension("sqlite-shm");
        if shm.exists() {
            let _ = std::fs::remove_file(&shm);
        }

        std::fs::write(db_path, data)?;
        Ok(())
    }

    fn backup_entries() -> Result<Vec<std::fs::DirEntry>, std::io::Error> {
        let backup_directory = backup_dir();

        if !backup_directory.exists() {
            return Ok(vec![]);
        }

        Ok(std::fs::read_dir(&backup_directory)?
            .filter_map(|e| e.ok())
            .filter(|e| {
                let path = e.path();
                path.extension().is_some_and(|ext| ext == "sqlite")
                    && path
                        .file_name()
                        .is_some_and(|n| n.to_string_lossy().starts_with("db_backup_"))
            })
            .collect())
    }
}
