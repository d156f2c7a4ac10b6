use crate::collector::collect;
use crate::render::{MarkdownRenderer, ReportRenderer, report_file_name};
use anyhow::{Context, Result};
use chrono::{DateTime, Days, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use mirrorwatch_core::config::AppConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{error, info};

/// Fixed recurrence after the first fire.
pub const REPORT_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid report time {hour:02}:{minute:02}")]
    InvalidTime { hour: u32, minute: u32 },
    #[error("Local time {0} cannot be represented")]
    Unrepresentable(NaiveDateTime),
}

/// When the next report fires and how often it repeats.
#[derive(Debug, Clone)]
pub struct ScheduleState<Tz: TimeZone> {
    pub next_fire: DateTime<Tz>,
    pub period: Duration,
}

impl<Tz: TimeZone> ScheduleState<Tz> {
    pub fn delay_from(&self, now: &DateTime<Tz>) -> Duration {
        (self.next_fire.clone() - now.clone())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Today at `hour:minute:00`, or tomorrow if that is strictly in the past.
///
/// A wall-clock time skipped by a DST jump moves forward one hour; an
/// ambiguous one takes the earlier instant.
pub fn schedule_next<Tz: TimeZone>(
    now: &DateTime<Tz>,
    hour: u32,
    minute: u32,
) -> Result<ScheduleState<Tz>, ScheduleError> {
    let fire_time =
        NaiveTime::from_hms_opt(hour, minute, 0).ok_or(ScheduleError::InvalidTime { hour, minute })?;
    let tz = now.timezone();
    let today = now.date_naive().and_time(fire_time);

    let mut next_fire = localize(&tz, today)?;
    if next_fire < *now {
        let tomorrow = today
            .checked_add_days(Days::new(1))
            .ok_or(ScheduleError::Unrepresentable(today))?;
        next_fire = localize(&tz, tomorrow)?;
    }

    Ok(ScheduleState {
        next_fire,
        period: REPORT_PERIOD,
    })
}

fn localize<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Result<DateTime<Tz>, ScheduleError> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + chrono::Duration::hours(1))).earliest())
        .ok_or(ScheduleError::Unrepresentable(naive))
}

/// Collects the mirror and renders it into `report_dir`.
///
/// Returns `Ok(None)` without touching the renderer when there is nothing
/// to report.
pub fn generate_report(
    mirror_dir: &Path,
    report_dir: &Path,
    renderer: &dyn ReportRenderer,
    date: NaiveDate,
) -> Result<Option<PathBuf>> {
    let dataset = collect(mirror_dir)?;
    if dataset.is_empty() {
        info!("📊 Mirror {} is empty; skipping report", mirror_dir.display());
        return Ok(None);
    }

    let target = report_dir.join(report_file_name(date, renderer.extension()));
    renderer
        .render(&dataset, mirror_dir, &target)
        .with_context(|| format!("Failed to render {}", target.display()))?;

    info!(
        "📊 Report written to {} ({} files)",
        target.display(),
        dataset.len()
    );
    Ok(Some(target))
}

pub struct ReportScheduler {
    mirror_dir: PathBuf,
    report_dir: PathBuf,
    hour: u32,
    minute: u32,
    renderer: Arc<dyn ReportRenderer>,
}

impl ReportScheduler {
    pub fn new(
        mirror_dir: impl Into<PathBuf>,
        report_dir: impl Into<PathBuf>,
        hour: u32,
        minute: u32,
        renderer: Arc<dyn ReportRenderer>,
    ) -> Self {
        Self {
            mirror_dir: mirror_dir.into(),
            report_dir: report_dir.into(),
            hour,
            minute,
            renderer,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.mirror_path(),
            config.report_path(),
            config.report_hour,
            config.report_minute,
            Arc::new(MarkdownRenderer),
        )
    }

    /// Fires daily until `shutdown` flips to true.
    pub async fn start(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("🕒 Report Scheduler: Background engine spinning up...");

        let now = Local::now();
        let state = schedule_next(&now, self.hour, self.minute)?;
        info!(
            "🕒 Report Scheduler: first report at {}, then every {}h",
            state.next_fire.format("%Y-%m-%d %H:%M:%S"),
            state.period.as_secs() / 3600
        );

        self.run(state.delay_from(&now), state.period, shutdown).await
    }

    /// Fires once after `first_delay`, then every `period`, until `shutdown`
    /// flips to true.
    ///
    /// Fires run inline on this task, so two fires never overlap; a late
    /// tick is delayed rather than bursted. The period is never re-anchored
    /// to the wall clock.
    pub async fn run(
        self: Arc<Self>,
        first_delay: Duration,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let first = tokio::time::Instant::now() + first_delay;
        let mut timer = tokio::time::interval_at(first, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = timer.tick() => {
                    self.fire().await;
                }
            }
        }

        info!("🕒 Report Scheduler: Stopped.");
        Ok(())
    }

    /// One report cycle. Errors are logged, never propagated.
    pub async fn fire(&self) -> Option<PathBuf> {
        let mirror_dir = self.mirror_dir.clone();
        let report_dir = self.report_dir.clone();
        let renderer = Arc::clone(&self.renderer);

        let result = tokio::task::spawn_blocking(move || {
            generate_report(
                &mirror_dir,
                &report_dir,
                renderer.as_ref(),
                Local::now().date_naive(),
            )
        })
        .await;

        match result {
            Ok(Ok(path)) => path,
            Ok(Err(e)) => {
                error!("Scheduler: Report error: {:#}", e);
                None
            }
            Err(e) => {
                error!("Scheduler: Report task failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike, Utc};

    #[test]
    fn fire_time_later_today_stays_today() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 14, 0, 0).unwrap();
        let state = schedule_next(&now, 15, 0).unwrap();

        assert_eq!(state.next_fire, Utc.with_ymd_and_hms(2026, 10, 17, 15, 0, 0).unwrap());
        assert_eq!(state.delay_from(&now), Duration::from_secs(3600));
    }

    #[test]
    fn fire_time_already_passed_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 16, 0, 0).unwrap();
        let state = schedule_next(&now, 15, 0).unwrap();

        assert_eq!(state.next_fire, Utc.with_ymd_and_hms(2026, 10, 18, 15, 0, 0).unwrap());
        assert!(state.next_fire > now);
    }

    #[test]
    fn month_end_rolls_into_next_month() {
        let now = Utc.with_ymd_and_hms(2026, 12, 31, 23, 30, 0).unwrap();
        let state = schedule_next(&now, 6, 15).unwrap();

        assert_eq!(state.next_fire, Utc.with_ymd_and_hms(2027, 1, 1, 6, 15, 0).unwrap());
    }

    #[test]
    fn exact_fire_instant_is_not_in_the_past() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 15, 0, 0).unwrap();
        let state = schedule_next(&now, 15, 0).unwrap();

        assert_eq!(state.next_fire, now);
        assert_eq!(state.delay_from(&now), Duration::ZERO);
    }

    #[test]
    fn period_is_a_flat_day_whichever_day_fires_first() {
        let before = Utc.with_ymd_and_hms(2026, 10, 17, 14, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 10, 17, 16, 0, 0).unwrap();

        assert_eq!(schedule_next(&before, 15, 0).unwrap().period, REPORT_PERIOD);
        assert_eq!(schedule_next(&after, 15, 0).unwrap().period, REPORT_PERIOD);
        assert_eq!(REPORT_PERIOD, Duration::from_secs(24 * 60 * 60));
    }

    #[test]
    fn schedule_keeps_the_callers_offset() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2026, 10, 17, 16, 0, 0).unwrap();
        let state = schedule_next(&now, 15, 0).unwrap();

        assert_eq!(state.next_fire.offset(), &tz);
        assert_eq!(state.next_fire.hour(), 15);
        assert_eq!(state.next_fire.date_naive(), NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
    }

    #[test]
    fn invalid_time_is_rejected() {
        let now = Utc::now();
        assert!(matches!(
            schedule_next(&now, 24, 0),
            Err(ScheduleError::InvalidTime { hour: 24, minute: 0 })
        ));
        assert!(matches!(
            schedule_next(&now, 10, 60),
            Err(ScheduleError::InvalidTime { .. })
        ));
    }
}
