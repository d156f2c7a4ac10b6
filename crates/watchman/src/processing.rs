use crate::{WatchEvent, WatchSignal, WatchSource, Watchman};
use mirrorwatch_io::CopyError;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

impl Watchman {
    /// Copies one created file into the mirror under its bare name.
    pub async fn handle_event(&self, event: &WatchEvent) -> Result<u64, CopyError> {
        let target = self.mirror_dir.join(&event.name);
        self.copier.copy(&event.path, &target).await
    }

    /// Starts observing, backfills, then watches until `shutdown` flips to
    /// true.
    ///
    /// The source is live before the backfill begins, so a file created
    /// while the backfill runs is either listed by it or queued as an event.
    pub async fn start(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        info!("👀 Watchman: Starting observation of {}", self.watch_dir.display());

        let (mut source, signals) = WatchSource::new(&self.watch_dir);
        match source.start() {
            Ok(()) => {
                if let Err(e) = self.backfill().await {
                    error!("Startup backfill failed: {:#}", e);
                }
            }
            Err(e) => {
                error!("Watch source failed to start: {:#}", e);
                self.heal(&mut source, &shutdown).await;
            }
        }

        self.run(source, signals, shutdown).await
    }

    /// Drives `source` until shutdown. Events are handled inline, one at a
    /// time; a fault replaces the observation handle and re-runs backfill.
    ///
    /// Shutdown is only observed between signals, so an in-flight copy
    /// (including a lock wait) always runs to completion.
    pub async fn run(
        &self,
        mut source: WatchSource,
        mut signals: mpsc::Receiver<WatchSignal>,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        if let Err(e) = source.start() {
            error!("Watch source failed to start: {:#}", e);
            self.heal(&mut source, &shutdown).await;
        }

        info!("👀 Watchman: Ready and watching.");

        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                signal = signals.recv() => match signal {
                    Some(WatchSignal::Created(event)) => {
                        debug!("👀 Watchman detected {:?}", event.path);
                        if let Err(e) = self.handle_event(&event).await {
                            error!("Watchman Error processing {:?}: {}", event.path, e);
                        }
                    }
                    Some(WatchSignal::Fault { generation, reason }) => {
                        if source.is_current(generation) {
                            warn!("⚠️ Watch source faulted: {}", reason);
                            source.mark_faulted();
                            self.heal(&mut source, &shutdown).await;
                        } else {
                            debug!("Ignoring fault from retired generation {}: {}", generation, reason);
                        }
                    }
                    None => break,
                },
            }
        }

        source.stop();
        info!("👀 Watchman: Shut down.");
        Ok(())
    }

    /// Recreates the handle until it sticks, with no backoff, then backfills
    /// to pick up anything created while the source was down.
    async fn heal(&self, source: &mut WatchSource, shutdown: &watch::Receiver<bool>) {
        let mut failures = 0u64;
        loop {
            match source.restart() {
                Ok(()) => break,
                Err(e) => {
                    if failures == 0 {
                        error!("Watch source restart failed, retrying: {:#}", e);
                    } else {
                        debug!("Watch source restart attempt {} failed: {:#}", failures + 1, e);
                    }
                    failures += 1;
                    if *shutdown.borrow() {
                        return;
                    }
                    tokio::task::yield_now().await;
                }
            }
        }
        if failures > 0 {
            info!("♻️ Watch source recovered after {} failed restarts", failures);
        }

        if let Err(e) = self.backfill().await {
            error!("Post-restart backfill failed: {:#}", e);
        }
    }
}
