//! Backup creation and retention pruning against a throwaway directory.

use std::path::Path;

use db::backup::BackupService;
use tempfile::TempDir;

fn write_backup(dir: &Path, stamp: &str) {
    std::fs::write(
        dir.join(format!("db_backup_{stamp}.sqlite")),
        b"sqlite bytes",
    )
    .expect("Failed to write backup fixture");
    // Distinct mtimes so retention ordering is deterministic
    std::thread::sleep(std::time::Duration::from_millis(20));
}

#[test]
fn retention_keeps_newest_backups() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    // SAFETY: This test binary is single-threaded at this point; the env var
    // scopes all BackupService paths to the temp dir.
    unsafe {
        std::env::set_var("TLU_BACKUP_DIR", temp_dir.path());
    }

    for stamp in [
        "20250101_100000",
        "20250102_100000",
        "20250103_100000",
        "20250104_100000",
    ] {
        write_backup(temp_dir.path(), stamp);
    }

    let listed = BackupService::list_backups().expect("List failed");
    assert_eq!(listed.len(), 4);
    // Newest first
    assert_eq!(listed[0].filename, "db_backup_20250104_100000.sqlite");

    BackupService::cleanup_old_backups_with_retention(2).expect("Cleanup failed");

    let remaining = BackupService::list_backups().expect("List failed");
    assert_eq!(remaining.len(), 2);
    assert_eq!(remaining[0].filename, "db_backup_20250104_100000.sqlite");
    assert_eq!(remaining[1].filename, "db_backup_20250103_100000.sqlite");

    let newest = BackupService::newest_backup().expect("A backup should remain");
    assert!(newest.ends_with("db_backup_20250104_100000.sqlite"));

    // Restore replaces the database file and drops stale companions
    let db_path = temp_dir.path().join("db.sqlite");
    std::fs::write(&db_path, b"corrupted").unwrap();
    std::fs::write(db_path.with_extension("sqlite-wal"), b"stale wal").unwrap();

    let data = std::fs::read(&newest).unwrap();
    BackupService::restore_from_data(&db_path, &data).expect("Restore failed");
    assert_eq!(std::fs::read(&db_path).unwrap(), b"sqlite bytes");
    assert!(!db_path.with_extension("sqlite-wal").exists());

    // Missing database file is a typed error, not an io surprise
    let missing = temp_dir.path().join("nope.sqlite");
    assert!(matches!(
        BackupService::create_backup(&missing),
        Err(db::backup::BackupError::DatabaseNotFound(_))
    ));
}
