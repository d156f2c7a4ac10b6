use chrono::{DateTime, Local};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("Failed to enumerate {path}: {source}")]
    Enumerate {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// A file in the mirror as seen at enumeration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    /// Display form; lossy for names that are not valid UTF-8.
    pub name: String,
    /// Exact on-disk name.
    pub file_name: OsString,
    pub size: u64,
}

impl TrackedFile {
    pub fn new(file_name: impl Into<OsString>, size: u64) -> Self {
        let file_name = file_name.into();
        Self {
            name: file_name.to_string_lossy().into_owned(),
            file_name,
            size,
        }
    }

    /// Looked up on demand; `None` once the file is gone.
    pub fn last_modified(&self, dir: &Path) -> Option<DateTime<Local>> {
        std::fs::metadata(dir.join(&self.file_name))
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Local>::from)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportDataset {
    entries: Vec<TrackedFile>,
}

impl ReportDataset {
    pub fn new(entries: Vec<TrackedFile>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[TrackedFile] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|f| f.size).sum()
    }
}

/// Lists the regular files directly inside `dir`, in enumeration order.
///
/// A missing directory is a warning and yields an empty dataset. Entries
/// that cannot be read are skipped.
pub fn collect(dir: &Path) -> Result<ReportDataset, CollectError> {
    if !dir.exists() {
        warn!("Report directory {} does not exist; nothing to collect", dir.display());
        return Ok(ReportDataset::default());
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(CollectError::Enumerate {
                    path: dir.to_path_buf(),
                    source: e,
                });
            }
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        match entry.metadata() {
            Ok(meta) => entries.push(TrackedFile::new(entry.file_name(), meta.len())),
            Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
        }
    }

    Ok(ReportDataset::new(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdirectories_are_not_tracked() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"abc").unwrap();
        std::fs::create_dir(tmp.path().join("nested")).unwrap();

        let dataset = collect(tmp.path()).unwrap();

        assert_eq!(dataset.entries(), &[TrackedFile::new("a.txt", 3)]);
        assert!(dataset.entries()[0].last_modified(tmp.path()).is_some());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_name_still_resolves_last_modified() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = tempfile::tempdir().unwrap();
        let raw = OsStr::from_bytes(b"scan-\xff.bin");
        std::fs::write(tmp.path().join(raw), b"data").unwrap();

        let dataset = collect(tmp.path()).unwrap();
        let file = &dataset.entries()[0];

        assert_eq!(file.file_name.as_os_str(), raw);
        assert_eq!(file.name, "scan-\u{FFFD}.bin");
        assert!(file.last_modified(tmp.path()).is_some());
    }
}
