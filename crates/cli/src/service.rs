//! Start and stop hooks for the long-running service.

use anyhow::Result;
use mirrorwatch_core::bootstrap::ensure_directories;
use mirrorwatch_core::config::AppConfig;
use mirrorwatch_reports::ReportScheduler;
use mirrorwatch_watchman::Watchman;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub struct MirrorService;

/// Running service; dropping it without `stop` leaves the tasks detached.
pub struct ServiceHandle {
    shutdown: watch::Sender<bool>,
    ingestion: JoinHandle<Result<()>>,
    reports: JoinHandle<Result<()>>,
}

impl MirrorService {
    pub fn start(config: &AppConfig) -> ServiceHandle {
        let failures = ensure_directories(config);
        if !failures.is_empty() {
            warn!(
                "{} working directories could not be created; continuing anyway",
                failures.len()
            );
        }

        let (shutdown, shutdown_rx) = watch::channel(false);

        let watchman = Arc::new(Watchman::from_config(config));
        let scheduler = Arc::new(ReportScheduler::from_config(config));

        let ingestion = tokio::spawn(watchman.start(shutdown_rx.clone()));
        let reports = tokio::spawn(scheduler.start(shutdown_rx));

        info!("🪞 MirrorWatch service started");
        ServiceHandle {
            shutdown,
            ingestion,
            reports,
        }
    }
}

impl ServiceHandle {
    /// Signals both subsystems and waits for them. In-flight copies and
    /// reports finish first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);

        for (name, task) in [("ingestion", self.ingestion), ("reports", self.reports)] {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("{} task ended with error: {:#}", name, e),
                Err(e) => error!("{} task panicked or was aborted: {}", name, e),
            }
        }

        info!("🪞 MirrorWatch service stopped");
    }
}
