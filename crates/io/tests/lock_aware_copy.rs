use std::time::{Duration, Instant};

use mirrorwatch_io::{CopyError, FileCopier, LockAwareCopier};

#[tokio::test]
async fn copies_and_overwrites_existing_destination() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("report.csv");
    let destination = tmp.path().join("mirror.csv");
    std::fs::write(&source, b"fresh contents").unwrap();
    std::fs::write(&destination, b"stale contents that are longer").unwrap();

    let bytes = LockAwareCopier::new()
        .copy(&source, &destination)
        .await
        .unwrap();

    assert_eq!(bytes, 14);
    assert_eq!(std::fs::read(&destination).unwrap(), b"fresh contents");
}

#[tokio::test]
async fn missing_source_fails_without_retrying() {
    let tmp = tempfile::tempdir().unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        LockAwareCopier::new().copy(&tmp.path().join("gone.txt"), &tmp.path().join("out.txt")),
    )
    .await
    .expect("a missing file must not be treated as a lock");

    assert!(matches!(result, Err(CopyError::Probe { .. })));
}

#[tokio::test]
async fn copy_step_failure_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("a.txt");
    std::fs::write(&source, b"data").unwrap();
    let destination = tmp.path().join("no-such-dir").join("a.txt");

    let result = LockAwareCopier::new().copy(&source, &destination).await;

    assert!(matches!(result, Err(CopyError::Copy { .. })));
}

#[cfg(unix)]
#[tokio::test]
async fn waits_for_writer_lock_before_copying() {
    use fs2::FileExt;

    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("a.txt");
    let destination = tmp.path().join("copy.txt");
    std::fs::write(&source, b"locked payload").unwrap();

    let writer = std::fs::File::open(&source).unwrap();
    FileExt::lock_exclusive(&writer).unwrap();

    let copier = LockAwareCopier::new();
    let retry = copier.retry_interval();
    let (src, dst) = (source.clone(), destination.clone());
    let task = tokio::spawn(async move { copier.copy(&src, &dst).await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!task.is_finished(), "copy finished while the source was locked");
    assert!(!destination.exists());

    let released = Instant::now();
    drop(writer);

    let bytes = task.await.unwrap().unwrap();
    // one retry interval plus scheduling slack
    assert!(released.elapsed() < retry + Duration::from_millis(400));
    assert_eq!(bytes, 14);
    assert_eq!(std::fs::read(&destination).unwrap(), b"locked payload");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn waits_for_plain_writer_to_close_before_copying() {
    use std::io::Write;

    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("growing.log");
    let destination = tmp.path().join("copy.log");

    let mut writer = std::fs::File::create(&source).unwrap();
    writer.write_all(b"first-chunk").unwrap();

    let copier = LockAwareCopier::new();
    let (src, dst) = (source.clone(), destination.clone());
    let task = tokio::spawn(async move { copier.copy(&src, &dst).await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!task.is_finished(), "copy started while the writer still had the file open");

    writer.write_all(b"-second-chunk").unwrap();
    drop(writer);

    let bytes = task.await.unwrap().unwrap();
    assert_eq!(bytes, 24);
    assert_eq!(std::fs::read(&destination).unwrap(), b"first-chunk-second-chunk");
}
