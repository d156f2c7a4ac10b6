//! Creates the working directories before anything else runs.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::config::AppConfig;

/// A directory that could not be created.
#[derive(Debug)]
pub struct DirectoryFailure {
    pub path: PathBuf,
    pub error: std::io::Error,
}

/// Ensures the watch, mirror and report directories exist.
///
/// Failures are logged and returned; startup is expected to continue.
pub fn ensure_directories(config: &AppConfig) -> Vec<DirectoryFailure> {
    let dirs = [config.watch_path(), config.mirror_path(), config.report_path()];
    ensure_dirs(dirs.iter().map(PathBuf::as_path))
}

pub fn ensure_dirs<'a>(dirs: impl IntoIterator<Item = &'a Path>) -> Vec<DirectoryFailure> {
    let mut failures = Vec::new();

    for dir in dirs {
        if dir.is_dir() {
            continue;
        }
        match std::fs::create_dir_all(dir) {
            Ok(()) => info!("📁 Created directory {}", dir.display()),
            Err(e) => {
                error!("Failed to create directory {}: {}", dir.display(), e);
                failures.push(DirectoryFailure {
                    path: dir.to_path_buf(),
                    error: e,
                });
            }
        }
    }

    failures
}
