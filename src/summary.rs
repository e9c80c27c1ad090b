//! Per-machine status aggregation.
//!
//! Turns a newest-first list of reports into a [`MachineSummary`]: broken
//! counts over the most recent reports, over the current local day, and over
//! the trailing seven days. `now` is always passed in so results never depend
//! on the wall clock.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::level::{LatestState, StatusLevel, broken_pct};
use crate::report::{MachineId, Report};
use crate::store::StoreError;

/// Number of most recent reports that make up the recent window.
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Length of the trailing week window. A fixed 168 hours, not calendar days.
pub const WEEK_HOURS: i64 = 7 * 24;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StatusError {
    #[error("window size must be positive, got {0}")]
    InvalidWindowSize(usize),
}

/// Derived statistics for one machine at one point in time. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineSummary {
    pub machine_id: MachineId,
    pub recent_reports_total: usize,
    pub recent_reports_broken: usize,
    pub broken_today: usize,
    pub total_today: usize,
    pub broken_last_7_days: usize,
    pub total_last_7_days: usize,
    pub latest_report: Option<Report>,
}

impl MachineSummary {
    /// The summary of a machine nobody has reported on.
    pub fn empty(machine_id: MachineId) -> Self {
        Self {
            machine_id,
            recent_reports_total: 0,
            recent_reports_broken: 0,
            broken_today: 0,
            total_today: 0,
            broken_last_7_days: 0,
            total_last_7_days: 0,
            latest_report: None,
        }
    }

    pub fn recent_broken_pct(&self) -> u8 {
        broken_pct(self.recent_reports_broken, self.recent_reports_total)
    }

    pub fn today_broken_pct(&self) -> u8 {
        broken_pct(self.broken_today, self.total_today)
    }

    pub fn week_broken_pct(&self) -> u8 {
        broken_pct(self.broken_last_7_days, self.total_last_7_days)
    }

    /// Severity of the recent window.
    pub fn level(&self) -> StatusLevel {
        StatusLevel::from_pct(self.recent_broken_pct())
    }

    pub fn latest_state(&self) -> LatestState {
        match &self.latest_report {
            Some(r) if r.is_broken => LatestState::Broken,
            Some(_) => LatestState::Working,
            None => LatestState::NoReports,
        }
    }
}

/// A summary together with its derived percentages and levels, as shown to
/// residents.
#[derive(Debug, Serialize)]
pub struct SummaryView<'a> {
    #[serde(flatten)]
    pub summary: &'a MachineSummary,
    pub recent_broken_pct: u8,
    pub today_broken_pct: u8,
    pub week_broken_pct: u8,
    pub level: StatusLevel,
    pub latest_state: LatestState,
}

impl MachineSummary {
    pub fn view(&self) -> SummaryView<'_> {
        SummaryView {
            summary: self,
            recent_broken_pct: self.recent_broken_pct(),
            today_broken_pct: self.today_broken_pct(),
            week_broken_pct: self.week_broken_pct(),
            level: self.level(),
            latest_state: self.latest_state(),
        }
    }
}

/// Summarizes one machine's reports.
///
/// `reports` must be ordered newest-first; the recent window is simply the
/// first `window_size` entries. All reports, not just the window, are
/// classified into the day and week counters independently. The day starts
/// at local midnight in `now`'s timezone.
pub fn summarize<Tz: TimeZone>(
    machine_id: MachineId,
    reports: &[Report],
    now: &DateTime<Tz>,
    window_size: usize,
) -> Result<MachineSummary, StatusError> {
    if window_size == 0 {
        return Err(StatusError::InvalidWindowSize(window_size));
    }

    let mut s = MachineSummary::empty(machine_id);

    let recent = &reports[..window_size.min(reports.len())];
    s.recent_reports_total = recent.len();
    s.recent_reports_broken = recent.iter().filter(|r| r.is_broken).count();

    let tz = now.timezone();
    let today = now.date_naive();
    let week_start = now.with_timezone(&Utc) - TimeDelta::hours(WEEK_HOURS);

    for r in reports {
        // Comparing local dates is `created_at >= local midnight` without
        // having to resolve midnight itself, which DST can skip.
        if r.created_at.with_timezone(&tz).date_naive() >= today {
            s.total_today += 1;
            if r.is_broken {
                s.broken_today += 1;
            }
        }

        if r.created_at >= week_start {
            s.total_last_7_days += 1;
            if r.is_broken {
                s.broken_last_7_days += 1;
            }
        }
    }

    s.latest_report = reports.first().cloned();

    Ok(s)
}

/// The result for one machine in a facility-wide pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineStatus {
    pub machine_id: MachineId,
    pub outcome: Result<MachineSummary, StoreError>,
}

// Successful machines serialize as their summary view, failed ones as
// `{ machine_id, error }`.
impl Serialize for MachineStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Failure {
            machine_id: MachineId,
            error: String,
        }

        match &self.outcome {
            Ok(summary) => summary.view().serialize(serializer),
            Err(e) => Failure {
                machine_id: self.machine_id,
                error: e.to_string(),
            }
            .serialize(serializer),
        }
    }
}

/// Summarizes every machine in ascending id order.
///
/// A fetch failure stays attached to its machine instead of being replaced
/// by an empty summary, so "store failed" can't be mistaken for "no reports".
pub fn summarize_all<Tz, F>(
    machine_ids: &BTreeSet<MachineId>,
    mut fetch: F,
    now: &DateTime<Tz>,
    window_size: usize,
) -> Result<Vec<MachineStatus>, StatusError>
where
    Tz: TimeZone,
    F: FnMut(MachineId) -> Result<Vec<Report>, StoreError>,
{
    if window_size == 0 {
        return Err(StatusError::InvalidWindowSize(window_size));
    }

    let mut statuses = Vec::with_capacity(machine_ids.len());

    for &machine_id in machine_ids {
        let outcome = match fetch(machine_id) {
            Ok(reports) => Ok(summarize(machine_id, &reports, now, window_size)?),
            Err(e) => Err(e),
        };
        statuses.push(MachineStatus {
            machine_id,
            outcome,
        });
    }

    Ok(statuses)
}
