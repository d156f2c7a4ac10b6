use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mirrorwatch_io::{CopyError, FileCopier, LockAwareCopier};
use mirrorwatch_watchman::{BackfillSummary, WatchEvent, Watchman};

/// Delegates to the real copier and counts calls; names in `fail` error out.
#[derive(Default)]
struct CountingCopier {
    calls: AtomicUsize,
    fail: Mutex<Vec<String>>,
}

#[async_trait]
impl FileCopier for CountingCopier {
    async fn copy(&self, source: &Path, destination: &Path) -> Result<u64, CopyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = source.file_name().unwrap().to_string_lossy().to_string();
        if self.fail.lock().unwrap().contains(&name) {
            return Err(CopyError::Copy {
                from: source.to_path_buf(),
                to: destination.to_path_buf(),
                source: std::io::Error::other("injected failure"),
            });
        }
        LockAwareCopier::new().copy(source, destination).await
    }
}

fn dirs() -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let watch_dir = tmp.path().join("inbox");
    let mirror_dir = tmp.path().join("mirror");
    std::fs::create_dir_all(&watch_dir).unwrap();
    std::fs::create_dir_all(&mirror_dir).unwrap();
    (tmp, watch_dir, mirror_dir)
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn backfill_copies_only_unmirrored_files() {
    let (_tmp, watch_dir, mirror_dir) = dirs();
    std::fs::write(watch_dir.join("new.txt"), b"new").unwrap();
    std::fs::write(watch_dir.join("old.txt"), b"source version").unwrap();
    std::fs::write(mirror_dir.join("old.txt"), b"mirror version").unwrap();
    std::fs::create_dir(watch_dir.join("nested")).unwrap();

    let watchman = Watchman::with_lock_aware_copier(&watch_dir, &mirror_dir);
    let summary = watchman.backfill().await.unwrap();

    assert_eq!(
        summary,
        BackfillSummary {
            copied: 1,
            skipped: 1,
            failed: 0
        }
    );
    assert_eq!(std::fs::read(mirror_dir.join("new.txt")).unwrap(), b"new");
    // name presence alone decides; no overwrite
    assert_eq!(
        std::fs::read(mirror_dir.join("old.txt")).unwrap(),
        b"mirror version"
    );
    assert!(!mirror_dir.join("nested").exists());
}

#[tokio::test]
async fn second_backfill_makes_no_copies() {
    let (_tmp, watch_dir, mirror_dir) = dirs();
    for name in ["a.txt", "b.txt", "c.txt"] {
        std::fs::write(watch_dir.join(name), name.as_bytes()).unwrap();
    }
    let copier = Arc::new(CountingCopier::default());
    let watchman = Watchman::new(&watch_dir, &mirror_dir, copier.clone());

    watchman.backfill().await.unwrap();
    let after_first = count_files(&mirror_dir);
    let calls_after_first = copier.calls.load(Ordering::SeqCst);

    let second = watchman.backfill().await.unwrap();

    assert_eq!(after_first, 3);
    assert_eq!(count_files(&mirror_dir), after_first);
    assert_eq!(copier.calls.load(Ordering::SeqCst), calls_after_first);
    assert_eq!(second.copied, 0);
    assert_eq!(second.skipped, 3);
}

#[tokio::test]
async fn failed_copy_does_not_abort_backfill() {
    let (_tmp, watch_dir, mirror_dir) = dirs();
    for name in ["a.txt", "b.txt", "c.txt"] {
        std::fs::write(watch_dir.join(name), name.as_bytes()).unwrap();
    }
    let copier = Arc::new(CountingCopier::default());
    copier.fail.lock().unwrap().push("b.txt".to_string());
    let watchman = Watchman::new(&watch_dir, &mirror_dir, copier);

    let summary = watchman.backfill().await.unwrap();

    assert_eq!(summary.copied, 2);
    assert_eq!(summary.failed, 1);
    assert!(mirror_dir.join("a.txt").exists());
    assert!(!mirror_dir.join("b.txt").exists());
    assert!(mirror_dir.join("c.txt").exists());
}

#[tokio::test]
async fn missing_watch_dir_fails_the_pass() {
    let (tmp, _watch_dir, mirror_dir) = dirs();
    let watchman = Watchman::with_lock_aware_copier(tmp.path().join("absent"), &mirror_dir);

    assert!(watchman.backfill().await.is_err());
}

#[tokio::test]
async fn event_is_copied_under_its_bare_name() {
    let (_tmp, watch_dir, mirror_dir) = dirs();
    let path = watch_dir.join("invoice.pdf");
    std::fs::write(&path, b"%PDF").unwrap();
    std::fs::write(mirror_dir.join("invoice.pdf"), b"older").unwrap();

    let watchman = Watchman::with_lock_aware_copier(&watch_dir, &mirror_dir);
    let event = WatchEvent::from_path(path).unwrap();
    let bytes = watchman.handle_event(&event).await.unwrap();

    assert_eq!(bytes, 4);
    assert_eq!(std::fs::read(mirror_dir.join("invoice.pdf")).unwrap(), b"%PDF");
}
