//! Built-in scheduler: daily and weekly runs at configured UTC times.
//!
//! The next fire time is computed from the wall clock after every run, so a
//! slow run never queues a burst of catch-up runs.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use sv_config::settings::ScheduleSettings;
use sv_config::ConfigError;
use sv_runtime::ValidationRequest;
use sv_schemas::RunMode;

use crate::state::{AppState, Trigger};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Schedule {
    pub daily: Option<NaiveTime>,
    pub weekly: Option<(Weekday, NaiveTime)>,
}

impl Schedule {
    pub fn from_settings(s: &ScheduleSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            daily: s.daily_time()?,
            weekly: s.weekly()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.daily.is_none() && self.weekly.is_none()
    }

    /// Earliest instant strictly after `now` with the modes due then.
    ///
    /// When daily and weekly coincide both are returned, daily first.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, Vec<RunMode>)> {
        let mut due: Vec<(DateTime<Utc>, RunMode)> = Vec::new();
        if let Some(t) = self.daily {
            due.push((next_daily(now, t), RunMode::Daily));
        }
        if let Some((day, t)) = self.weekly {
            due.push((next_weekly(now, day, t), RunMode::Weekly));
        }
        let at = due.iter().map(|(t, _)| *t).min()?;
        let modes = due.into_iter().filter(|(t, _)| *t == at).map(|(_, m)| m).collect();
        Some((at, modes))
    }
}

fn next_daily(now: DateTime<Utc>, t: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(t).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

fn next_weekly(now: DateTime<Utc>, day: Weekday, t: NaiveTime) -> DateTime<Utc> {
    let ahead = (i64::from(day.num_days_from_monday()) - i64::from(now.weekday().num_days_from_monday())).rem_euclid(7);
    let candidate = (now.date_naive() + Duration::days(ahead)).and_time(t).and_utc();
    if candidate > now {
        candidate
    } else {
        candidate + Duration::days(7)
    }
}

/// Spawn the scheduler loop. Does nothing when no schedule is configured.
pub fn spawn_scheduler(state: Arc<AppState>, schedule: Schedule) {
    if schedule.is_empty() {
        tracing::info!("no schedule configured; runs are HTTP-triggered only");
        return;
    }
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let Some((at, modes)) = schedule.next_after(now) else {
                return;
            };
            tracing::info!(next = %at, modes = ?modes, "next scheduled run");
            let wait = (at - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            for mode in modes {
                let req = ValidationRequest::for_mode(mode);
                match state.execute(&req, Trigger::Schedule).await {
                    Ok(rec) => tracing::info!(
                        mode = %mode,
                        fatal = rec.outcome.result.fatal,
                        discrepancies = rec.outcome.result.discrepancies.len(),
                        "scheduled run finished"
                    ),
                    Err(e) => tracing::error!(mode = %mode, kind = e.kind(), error = %e, "scheduled run aborted"),
                }
            }
        }
    });
}
