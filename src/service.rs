//! Facility-wide status built on a [`ReportStore`].
//!
//! Store calls are the only I/O here: every machine is fetched concurrently,
//! each fetch under its own timeout, and the results are handed to
//! [`summarize_all`] so ordering and per-machine failures stay as the pure
//! aggregator defines them.

use chrono::{DateTime, TimeZone};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, error, info, warn};

use crate::report::{MachineId, NewReport, Report};
use crate::store::{ReportStore, StoreError};
use crate::summary::{DEFAULT_WINDOW_SIZE, MachineStatus, StatusError, summarize_all};

pub struct StatusService<S> {
    store: Arc<S>,
    machines: BTreeSet<MachineId>,
    window_size: usize,
    fetch_timeout: Duration,
    concurrency: usize,
}

impl<S: ReportStore + 'static> StatusService<S> {
    pub fn new(store: Arc<S>, machines: BTreeSet<MachineId>) -> Self {
        Self {
            store,
            machines,
            window_size: DEFAULT_WINDOW_SIZE,
            fetch_timeout: Duration::from_secs(10),
            concurrency: 4,
        }
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Caps how many store fetches run at once. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Summaries for every facility machine, ascending by id.
    #[tracing::instrument(
        skip(self, now),
        fields(machines = self.machines.len(), window = self.window_size)
    )]
    pub async fn summaries<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> Result<Vec<MachineStatus>, StatusError> {
        if self.window_size == 0 {
            return Err(StatusError::InvalidWindowSize(self.window_size));
        }

        let mut fetched = self.fetch_all().await;

        let statuses = summarize_all(
            &self.machines,
            |id| {
                fetched.remove(&id).unwrap_or_else(|| {
                    Err(StoreError::Unavailable("fetch did not complete".into()))
                })
            },
            now,
            self.window_size,
        )?;

        let failed = statuses.iter().filter(|s| s.outcome.is_err()).count();
        if failed > 0 {
            warn!(failed, "Some machines could not be summarized");
        } else {
            info!(machines = statuses.len(), "Facility status computed");
        }

        Ok(statuses)
    }

    async fn fetch_all(&self) -> HashMap<MachineId, Result<Vec<Report>, StoreError>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = Vec::with_capacity(self.machines.len());

        for &machine_id in &self.machines {
            let sem = semaphore.clone();
            let store = self.store.clone();
            let timeout = self.fetch_timeout;

            let span = tracing::info_span!("fetch_machine", machine_id);

            let task = tokio::spawn(
                async move {
                    let _permit = match sem.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => return Err(StoreError::Unavailable(e.to_string())),
                    };

                    match tokio::time::timeout(timeout, store.fetch_reports(machine_id)).await {
                        Ok(Ok(reports)) => {
                            debug!(count = reports.len(), "Reports fetched");
                            Ok(reports)
                        }
                        Ok(Err(e)) => {
                            error!(error = %e, "Report fetch failed");
                            Err(e)
                        }
                        Err(_) => {
                            error!(timeout_secs = timeout.as_secs_f64(), "Report fetch timed out");
                            Err(StoreError::Unavailable(format!(
                                "fetch timed out after {timeout:?}"
                            )))
                        }
                    }
                }
                .instrument(span),
            );

            tasks.push((machine_id, task));
        }

        let mut results = HashMap::with_capacity(tasks.len());
        for (machine_id, task) in tasks {
            let result = task.await.unwrap_or_else(|e| {
                Err(StoreError::Unavailable(format!("fetch task failed: {e}")))
            });
            results.insert(machine_id, result);
        }
        results
    }

    /// One machine's reports, newest first.
    pub async fn machine_reports(&self, machine_id: MachineId) -> Result<Vec<Report>, StoreError> {
        self.check_machine(machine_id)?;

        let timeout = self.fetch_timeout;
        tokio::time::timeout(timeout, self.store.fetch_reports(machine_id))
            .await
            .map_err(|_| StoreError::Unavailable(format!("fetch timed out after {timeout:?}")))?
    }

    /// Validates a candidate against the facility and stores it.
    #[tracing::instrument(skip(self, candidate), fields(machine_id = candidate.machine_id))]
    pub async fn submit(&self, candidate: NewReport) -> Result<Report, StoreError> {
        let candidate = candidate.validate(&self.machines)?;
        let report = self.store.append_report(candidate).await?;
        info!(id = %report.id, is_broken = report.is_broken, "Report submitted");
        Ok(report)
    }

    fn check_machine(&self, machine_id: MachineId) -> Result<(), StoreError> {
        if self.machines.contains(&machine_id) {
            Ok(())
        } else {
            Err(StoreError::ValidationRejected(format!(
                "unknown machine {machine_id}"
            )))
        }
    }
}
