//! MirrorWatch Watchman - ingestion pipeline
//!
//! This crate is organized into:
//! - types: event and state data structures
//! - watcher: self-healing directory observer
//! - backfill: reconciliation of files that predate the watcher
//! - processing: per-event copy and the long-running ingestion loop

mod backfill;
mod processing;
mod types;
mod watcher;

pub use types::{BackfillSummary, WatchEvent, WatchSignal, WatchState};
pub use watcher::{FaultTrigger, WatchSource, WatchStatus};

use mirrorwatch_core::config::AppConfig;
use mirrorwatch_io::{FileCopier, LockAwareCopier};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Watchman - mirrors every file created in `watch_dir` into `mirror_dir`.
pub struct Watchman {
    watch_dir: PathBuf,
    mirror_dir: PathBuf,
    copier: Arc<dyn FileCopier>,
}

impl Watchman {
    pub fn new(
        watch_dir: impl Into<PathBuf>,
        mirror_dir: impl Into<PathBuf>,
        copier: Arc<dyn FileCopier>,
    ) -> Self {
        let watchman = Self {
            watch_dir: watch_dir.into(),
            mirror_dir: mirror_dir.into(),
            copier,
        };
        info!(
            "👀 Watchman initialized: {} -> {}",
            watchman.watch_dir.display(),
            watchman.mirror_dir.display()
        );
        watchman
    }

    pub fn with_lock_aware_copier(
        watch_dir: impl Into<PathBuf>,
        mirror_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::new(watch_dir, mirror_dir, Arc::new(LockAwareCopier::new()))
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_lock_aware_copier(config.watch_path(), config.mirror_path())
    }

    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }

    pub fn mirror_dir(&self) -> &Path {
        &self.mirror_dir
    }
}
