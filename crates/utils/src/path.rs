use std::path::PathBuf;

/// Expand a leading tilde in a user-supplied path (e.g. `~/last-update/db.sqlite`).
pub fn expand_tilde(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
