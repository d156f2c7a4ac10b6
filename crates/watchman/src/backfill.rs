use crate::{BackfillSummary, Watchman};
use anyhow::{Context, Result};
use tracing::{debug, error, info};

impl Watchman {
    /// Copies every file in the watch directory whose name is not yet
    /// present in the mirror. Presence of the name alone counts as mirrored.
    ///
    /// Per-file failures are logged and counted; only an unreadable watch
    /// directory fails the pass.
    pub async fn backfill(&self) -> Result<BackfillSummary> {
        let mut summary = BackfillSummary::default();
        let mut entries = tokio::fs::read_dir(&self.watch_dir)
            .await
            .with_context(|| format!("Failed to list {}", self.watch_dir.display()))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("Failed to list {}", self.watch_dir.display()))?
        {
            let is_file = match entry.file_type().await {
                Ok(file_type) => file_type.is_file(),
                Err(e) => {
                    error!("Backfill: cannot stat {}: {}", entry.path().display(), e);
                    summary.failed += 1;
                    continue;
                }
            };
            if !is_file {
                continue;
            }

            let target = self.mirror_dir.join(entry.file_name());
            if tokio::fs::try_exists(&target).await.unwrap_or(false) {
                debug!("Backfill: {} already mirrored", target.display());
                summary.skipped += 1;
                continue;
            }

            match self.copier.copy(&entry.path(), &target).await {
                Ok(_) => summary.copied += 1,
                Err(e) => {
                    error!("Backfill: {}", e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "🔁 Backfill complete: {} copied, {} already mirrored, {} failed",
            summary.copied, summary.skipped, summary.failed
        );
        Ok(summary)
    }
}
