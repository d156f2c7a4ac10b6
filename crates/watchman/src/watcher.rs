//! Self-healing directory observer.
//!
//! `WatchSource` owns one notify handle at a time. Any backend error, a
//! rescan request, or removal of the watched directory is surfaced as a
//! `WatchSignal::Fault`; the owner then calls [`WatchSource::restart`] to
//! swap in a fresh handle.

use crate::types::{WatchEvent, WatchSignal, WatchState};
use anyhow::{Context, Result, bail};
use notify::event::CreateKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Bounded signal channel; a full channel blocks the notify thread.
const SIGNAL_CHANNEL_CAPACITY: usize = 1024;

/// Shared, read-only view of a watch source's lifecycle.
#[derive(Debug, Clone, Default)]
pub struct WatchStatus {
    inner: Arc<StatusInner>,
}

#[derive(Debug, Default)]
struct StatusInner {
    state: AtomicU8,
    restarts: AtomicU64,
    generation: AtomicU64,
}

impl WatchStatus {
    pub fn state(&self) -> WatchState {
        WatchState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Number of successful restarts after a fault.
    pub fn restarts(&self) -> u64 {
        self.inner.restarts.load(Ordering::Acquire)
    }

    /// Generation of the current observation handle.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    fn set_state(&self, state: WatchState) {
        self.inner.state.store(state as u8, Ordering::Release);
    }

    fn next_generation(&self) -> u64 {
        self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn record_restart(&self) {
        self.inner.restarts.fetch_add(1, Ordering::AcqRel);
    }
}

/// Forces the watch source into the faulted state from outside.
#[derive(Debug, Clone)]
pub struct FaultTrigger {
    tx: mpsc::Sender<WatchSignal>,
    status: WatchStatus,
}

impl FaultTrigger {
    /// Returns false if the consumer is gone.
    pub async fn trip(&self, reason: impl Into<String>) -> bool {
        let signal = WatchSignal::Fault {
            generation: self.status.generation(),
            reason: reason.into(),
        };
        self.tx.send(signal).await.is_ok()
    }
}

pub struct WatchSource {
    dir: PathBuf,
    tx: mpsc::Sender<WatchSignal>,
    watcher: Option<RecommendedWatcher>,
    status: WatchStatus,
}

impl WatchSource {
    /// Creates a stopped source and the receiving end of its signals.
    pub fn new(dir: impl Into<PathBuf>) -> (Self, mpsc::Receiver<WatchSignal>) {
        let (tx, rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        let source = Self {
            dir: dir.into(),
            tx,
            watcher: None,
            status: WatchStatus::default(),
        };
        (source, rx)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn status(&self) -> WatchStatus {
        self.status.clone()
    }

    pub fn state(&self) -> WatchState {
        self.status.state()
    }

    pub fn fault_trigger(&self) -> FaultTrigger {
        FaultTrigger {
            tx: self.tx.clone(),
            status: self.status.clone(),
        }
    }

    /// Whether a fault tagged with `generation` concerns the live handle.
    pub fn is_current(&self, generation: u64) -> bool {
        self.status.generation() == generation
    }

    /// Stopped -> Active. A no-op when a handle already exists.
    pub fn start(&mut self) -> Result<()> {
        if self.watcher.is_some() {
            return Ok(());
        }

        let generation = self.status.next_generation();
        match self.spawn_handle(generation) {
            Ok(watcher) => {
                self.watcher = Some(watcher);
                self.status.set_state(WatchState::Active);
                info!("👀 Watching {} (generation {})", self.dir.display(), generation);
                Ok(())
            }
            Err(e) => {
                self.status.set_state(WatchState::Faulted);
                Err(e)
            }
        }
    }

    pub(crate) fn mark_faulted(&mut self) {
        self.status.set_state(WatchState::Faulted);
    }

    /// Faulted -> Active. The replacement handle is registered before the
    /// old one is dropped, so the directory is never left unobserved; a
    /// creation during the overlap may be reported twice.
    pub fn restart(&mut self) -> Result<()> {
        let generation = self.status.next_generation();
        match self.spawn_handle(generation) {
            Ok(watcher) => {
                let previous = self.watcher.replace(watcher);
                drop(previous);
                self.status.record_restart();
                self.status.set_state(WatchState::Active);
                info!(
                    "♻️ Watch source restarted for {} (generation {})",
                    self.dir.display(),
                    generation
                );
                Ok(())
            }
            Err(e) => {
                self.watcher = None;
                self.status.set_state(WatchState::Faulted);
                Err(e)
            }
        }
    }

    /// Any state -> Stopped. Disposes the handle.
    pub fn stop(&mut self) {
        if self.watcher.take().is_some() {
            info!("👀 Stopped watching {}", self.dir.display());
        }
        self.status.set_state(WatchState::Stopped);
    }

    fn spawn_handle(&self, generation: u64) -> Result<RecommendedWatcher> {
        // Checked first so a thrashing restart loop costs a stat, not an
        // inotify instance per attempt.
        if !self.dir.is_dir() {
            bail!("{} is not an accessible directory", self.dir.display());
        }

        let tx = self.tx.clone();
        let root = self.dir.clone();

        // Runs on the notify backend thread, never inside the runtime.
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            for signal in classify(&root, generation, res) {
                if tx.blocking_send(signal).is_err() {
                    return;
                }
            }
        })
        .context("Failed to create filesystem watcher")?;

        watcher
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", self.dir.display()))?;

        Ok(watcher)
    }
}

impl Drop for WatchSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Maps one backend notification to the signals worth surfacing.
fn classify(root: &Path, generation: u64, res: notify::Result<Event>) -> Vec<WatchSignal> {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            return vec![WatchSignal::Fault {
                generation,
                reason: e.to_string(),
            }];
        }
    };

    if event.need_rescan() {
        return vec![WatchSignal::Fault {
            generation,
            reason: "event queue overflowed".to_string(),
        }];
    }

    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event
            .paths
            .into_iter()
            .filter(|path| !path.is_dir())
            .filter_map(WatchEvent::from_path)
            .map(WatchSignal::Created)
            .collect(),
        EventKind::Remove(_) if event.paths.iter().any(|p| p == root) => {
            vec![WatchSignal::Fault {
                generation,
                reason: format!("watched directory {} was removed", root.display()),
            }]
        }
        other => {
            debug!("Ignoring {:?} for {:?}", other, event.paths);
            Vec::new()
        }
    }
}
