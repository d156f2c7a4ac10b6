//! Lock-aware file copying.
//!
//! A copy waits until the source is no longer held by its writer, then
//! transfers the whole file, overwriting the destination.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[cfg(unix)]
mod unix;

#[cfg(windows)]
mod windows;

/// Delay between two probes of a locked source.
pub const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum CopyError {
    #[error("Failed to open {path} for exclusive read: {source}")]
    Probe {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of a single exclusive-read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Free,
    Contended,
}

/// Checks once whether `path` is still held by a writer, releasing anything
/// it acquired right away.
pub fn probe(path: &Path) -> std::io::Result<ProbeOutcome> {
    #[cfg(unix)]
    {
        unix::probe(path)
    }

    #[cfg(windows)]
    {
        windows::probe(path)
    }

    #[cfg(not(any(unix, windows)))]
    {
        std::fs::File::open(path).map(|_| ProbeOutcome::Free)
    }
}

#[async_trait]
pub trait FileCopier: Send + Sync {
    /// Copies `source` to `destination`, returning the number of bytes written.
    async fn copy(&self, source: &Path, destination: &Path) -> Result<u64, CopyError>;
}

/// Copier that waits out writer locks before copying.
///
/// There is no upper bound on the wait: a file that stays locked stalls the
/// caller forever. Wrap the call in `tokio::time::timeout` if that matters.
#[derive(Debug, Clone)]
pub struct LockAwareCopier {
    retry_interval: Duration,
}

impl Default for LockAwareCopier {
    fn default() -> Self {
        Self::new()
    }
}

impl LockAwareCopier {
    pub fn new() -> Self {
        Self {
            retry_interval: LOCK_RETRY_INTERVAL,
        }
    }

    pub fn with_retry_interval(retry_interval: Duration) -> Self {
        Self { retry_interval }
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Suspends until an exclusive-read probe succeeds. Returns the number
    /// of contended attempts.
    pub async fn wait_until_unlocked(&self, source: &Path) -> Result<u64, CopyError> {
        let mut contended = 0u64;
        loop {
            let outcome = probe(source).map_err(|e| CopyError::Probe {
                path: source.to_path_buf(),
                source: e,
            })?;

            match outcome {
                ProbeOutcome::Free => return Ok(contended),
                ProbeOutcome::Contended => {
                    if contended == 0 {
                        info!("🔒 {} is held by its writer, waiting", source.display());
                    }
                    contended += 1;
                    tokio::time::sleep(self.retry_interval).await;
                }
            }
        }
    }
}

#[async_trait]
impl FileCopier for LockAwareCopier {
    async fn copy(&self, source: &Path, destination: &Path) -> Result<u64, CopyError> {
        let contended = self.wait_until_unlocked(source).await?;
        if contended > 0 {
            debug!(
                "Lock on {} released after {} retries",
                source.display(),
                contended
            );
        }

        let bytes = tokio::fs::copy(source, destination)
            .await
            .map_err(|e| CopyError::Copy {
                from: source.to_path_buf(),
                to: destination.to_path_buf(),
                source: e,
            })?;

        info!(
            "📄 Mirrored {} -> {} ({} bytes)",
            source.display(),
            destination.display(),
            bytes
        );
        Ok(bytes)
    }
}
