//! Report persistence.
//!
//! [`ReportStore`] is the async trait the rest of the crate talks to.
//! [`MemoryReportStore`] keeps reports in process, [`CsvReportStore`] in a
//! local CSV file, and [`RestReportStore`] in a hosted PostgREST table.

mod csv_file;
mod memory;
mod rest;

pub use csv_file::CsvReportStore;
pub use memory::MemoryReportStore;
pub use rest::RestReportStore;

use async_trait::async_trait;

use crate::report::{MachineId, NewReport, Report};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Transport or backend failure. Never means "no reports".
    #[error("report store unavailable: {0}")]
    Unavailable(String),

    /// The candidate report was refused.
    #[error("report rejected: {0}")]
    ValidationRejected(String),
}

/// Persists and retrieves reports.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Returns every report for `machine_id`, newest first. A machine with no
    /// reports yields an empty list, not an error.
    async fn fetch_reports(&self, machine_id: MachineId) -> Result<Vec<Report>, StoreError>;

    /// Stores a candidate, assigning its `id` and `created_at`.
    async fn append_report(&self, candidate: NewReport) -> Result<Report, StoreError>;
}
