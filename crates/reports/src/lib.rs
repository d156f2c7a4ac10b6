//! Daily summary of the mirror directory.
//!
//! A flat 24-hour timer collects `(name, size)` pairs from the mirror and
//! hands them to a [`ReportRenderer`].

pub mod collector;
pub mod render;
pub mod scheduler;

pub use collector::{CollectError, ReportDataset, TrackedFile, collect};
pub use render::{MarkdownRenderer, ReportRenderer, human_size, report_file_name};
pub use scheduler::{REPORT_PERIOD, ReportScheduler, ScheduleError, ScheduleState, generate_report, schedule_next};
