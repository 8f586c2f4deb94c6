use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");

/// Root data directory for the application.
///
/// Respects the `TLU_DATA_DIR` environment variable. In debug builds the
/// default is a `dev_assets` directory next to the workspace so development
/// state never pollutes the real data dir.
pub fn asset_dir() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("TLU_DATA_DIR") {
        let expanded = crate::path::expand_tilde(&path);
        if !expanded.exists() {
            std::fs::create_dir_all(&expanded).expect("Failed to create data directory");
        }
        return expanded;
    }

    let path = if cfg!(debug_assertions) {
        std::path::PathBuf::from(PROJECT_ROOT).join("../../dev_assets")
    } else {
        ProjectDirs::from("news", "lastupdate", "the-last-update")
            .expect("OS didn't give us a home directory")
            .data_dir()
            .to_path_buf()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).expect("Failed to create data directory");
    }

    path
}

/// Get the database file path.
///
/// Respects the `TLU_DATABASE_PATH` environment variable for custom locations.
/// Supports tilde expansion (e.g. `~/last-update/db.sqlite`).
///
/// Default: `{asset_dir}/db.sqlite`
pub fn database_path() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("TLU_DATABASE_PATH") {
        return crate::path::expand_tilde(&path);
    }
    asset_dir().join("db.sqlite")
}

/// Get the backup directory path.
///
/// Respects the `TLU_BACKUP_DIR` environment variable for custom locations.
///
/// Default: `{asset_dir}/backups`
pub fn backup_dir() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("TLU_BACKUP_DIR") {
        return crate::path::expand_tilde(&path);
    }
    asset_dir().join("backups")
}

/// Directory where uploaded publication images and member avatars are stored.
///
/// Respects the `TLU_UPLOADS_DIR` environment variable.
///
/// Default: `{asset_dir}/uploads`
pub fn uploads_dir() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("TLU_UPLOADS_DIR") {
        return crate::path::expand_tilde(&path);
    }
    asset_dir().join("uploads")
}

/// Path the sitemap is written to and served from.
pub fn sitemap_path() -> std::path::PathBuf {
    asset_dir().join("sitemap.xml")
}

/// Public base URL of the site, used for sitemap entries and push metadata.
///
/// Respects `TLU_SITE_URL`; defaults to a local development URL.
pub fn site_url() -> String {
    std::env::var("TLU_SITE_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string())
        .trim_end_matches('/')
        .to_string()
}
