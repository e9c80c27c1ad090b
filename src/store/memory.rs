use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::{ReportStore, StoreError};
use crate::report::{MachineId, NewReport, Report, ReportId};

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// In-process store. Reports are kept in insertion order.
pub struct MemoryReportStore {
    reports: RwLock<Vec<Report>>,
    clock: Clock,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    /// Uses `clock` to stamp new reports instead of the system time.
    pub fn with_clock(clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        Self {
            reports: RwLock::new(Vec::new()),
            clock: Box::new(clock),
        }
    }
}

impl Default for MemoryReportStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn fetch_reports(&self, machine_id: MachineId) -> Result<Vec<Report>, StoreError> {
        let reports = self.reports.read().await;
        let mut found: Vec<Report> = reports
            .iter()
            .filter(|r| r.machine_id == machine_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order among equal timestamps; reverse
        // puts the last inserted first.
        found.sort_by_key(|r| r.created_at);
        found.reverse();
        Ok(found)
    }

    async fn append_report(&self, candidate: NewReport) -> Result<Report, StoreError> {
        let mut reports = self.reports.write().await;

        let mut created_at = (self.clock)();
        if let Some(last) = reports.last() {
            created_at = created_at.max(last.created_at);
        }

        let id = ReportId::new((reports.len() + 1).to_string());
        let report = candidate.into_report(id, created_at);
        debug!(id = %report.id, machine_id = report.machine_id, "Report stored in memory");

        reports.push(report.clone());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::TemperatureSetting;
    use chrono::{TimeDelta, TimeZone};
    use std::sync::{Arc, Mutex};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_machine_is_empty() {
        let store = MemoryReportStore::new();
        assert!(store.fetch_reports(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_is_newest_first() {
        let ticks = Arc::new(Mutex::new(0i64));
        let clock_ticks = ticks.clone();
        let store = MemoryReportStore::with_clock(move || {
            let mut n = clock_ticks.lock().unwrap();
            *n += 1;
            t0() + TimeDelta::minutes(*n)
        });

        for (machine, broken, temperature) in [
            (1, false, TemperatureSetting::Low),
            (2, true, TemperatureSetting::Low),
            (1, true, TemperatureSetting::High),
        ] {
            store
                .append_report(NewReport::new(machine, broken, temperature))
                .await
                .unwrap();
        }

        let reports = store.fetch_reports(1).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports[0].is_broken);
        assert_eq!(reports[0].id.as_str(), "3");
        assert_eq!(reports[1].id.as_str(), "1");
    }

    #[tokio::test]
    async fn test_created_at_never_goes_backwards() {
        let ticks = Arc::new(Mutex::new(vec![t0(), t0() - TimeDelta::hours(1)]));
        let clock_ticks = ticks.clone();
        let store = MemoryReportStore::with_clock(move || clock_ticks.lock().unwrap().remove(0));

        let first = store
            .append_report(NewReport::new(1, false, TemperatureSetting::Low))
            .await
            .unwrap();
        let second = store
            .append_report(NewReport::new(1, true, TemperatureSetting::Low))
            .await
            .unwrap();

        assert_eq!(first.created_at, t0());
        assert_eq!(second.created_at, t0());

        let reports = store.fetch_reports(1).await.unwrap();
        assert_eq!(reports[0].id, second.id);
    }
}
