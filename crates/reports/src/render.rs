use crate::collector::ReportDataset;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use std::fmt::{self, Write as _};
use std::path::Path;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Turns a dataset into a document at `target`.
///
/// Callers skip rendering entirely for an empty dataset.
pub trait ReportRenderer: Send + Sync {
    /// File extension of the produced document, without the dot.
    fn extension(&self) -> &'static str;

    /// `mirror_dir` is where the dataset was collected, for fresh
    /// last-modified lookups.
    fn render(&self, dataset: &ReportDataset, mirror_dir: &Path, target: &Path) -> Result<()>;
}

/// `FileReport_2026-10-17.md`
pub fn report_file_name(date: NaiveDate, extension: &str) -> String {
    format!("FileReport_{}.{}", date.format("%Y-%m-%d"), extension)
}

/// Binary units with two decimals, plain bytes below 1 KB.
pub fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, SIZE_UNITS[unit])
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub fn render_to_string(
        &self,
        dataset: &ReportDataset,
        mirror_dir: &Path,
        generated_at: DateTime<Local>,
    ) -> Result<String, fmt::Error> {
        let mut out = String::new();
        write_document(&mut out, dataset, mirror_dir, generated_at)?;
        Ok(out)
    }
}

fn write_document(
    out: &mut impl fmt::Write,
    dataset: &ReportDataset,
    mirror_dir: &Path,
    generated_at: DateTime<Local>,
) -> fmt::Result {
    writeln!(out, "# File Report\n")?;
    writeln!(out, "Directory: `{}`\n", mirror_dir.display())?;
    writeln!(out, "| # | Name | Size | Last Modified |")?;
    writeln!(out, "|---:|---|---:|---|")?;

    for (index, file) in dataset.entries().iter().enumerate() {
        let modified = file
            .last_modified(mirror_dir)
            .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        writeln!(
            out,
            "| {} | {} | {} | {} |",
            index + 1,
            file.name.replace('|', "\\|"),
            human_size(file.size),
            modified
        )?;
    }

    writeln!(out)?;
    writeln!(out, "**Total files:** {}  ", dataset.len())?;
    writeln!(out, "**Total size:** {}", human_size(dataset.total_size()))?;
    writeln!(out, "\n---\n")?;
    writeln!(
        out,
        "Generated {} | Page 1 of 1",
        generated_at.format(TIMESTAMP_FORMAT)
    )
}

impl ReportRenderer for MarkdownRenderer {
    fn extension(&self) -> &'static str {
        "md"
    }

    fn render(&self, dataset: &ReportDataset, mirror_dir: &Path, target: &Path) -> Result<()> {
        let content = self
            .render_to_string(dataset, mirror_dir, Local::now())
            .context("Failed to format report")?;
        std::fs::write(target, content)
            .with_context(|| format!("Failed to write report {}", target.display()))
    }
}
