use std::ffi::OsString;
use std::path::PathBuf;

/// A file that appeared in the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub name: OsString,
}

impl WatchEvent {
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let name = path.file_name()?.to_os_string();
        Some(Self { path, name })
    }
}

/// What the watch source pushes to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    Created(WatchEvent),
    /// The observation handle identified by `generation` broke.
    Fault { generation: u64, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WatchState {
    Stopped = 0,
    Active = 1,
    Faulted = 2,
}

impl WatchState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Active,
            2 => Self::Faulted,
            _ => Self::Stopped,
        }
    }
}

/// Outcome of one backfill pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
}
