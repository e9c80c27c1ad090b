use async_trait::async_trait;
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;

use super::{ReportStore, StoreError};
use crate::report::{LoadType, MachineId, NewReport, Report, ReportId, TemperatureSetting};

/// One CSV row. Every column is always written so rows stay aligned.
#[derive(Debug, Serialize, Deserialize)]
struct Row {
    id: String,
    machine_id: MachineId,
    created_at: DateTime<Utc>,
    is_broken: bool,
    temperature_setting: TemperatureSetting,
    reran_count: u32,
    load_weight_kg: Option<f64>,
    load_type: Option<LoadType>,
    comments: Option<String>,
}

impl From<Row> for Report {
    fn from(row: Row) -> Self {
        Report {
            id: ReportId::new(row.id),
            machine_id: row.machine_id,
            created_at: row.created_at,
            is_broken: row.is_broken,
            temperature_setting: row.temperature_setting,
            reran_count: row.reran_count,
            load_weight_kg: row.load_weight_kg,
            load_type: row.load_type,
            comments: row.comments,
        }
    }
}

impl From<&Report> for Row {
    fn from(r: &Report) -> Self {
        Row {
            id: r.id.to_string(),
            machine_id: r.machine_id,
            created_at: r.created_at,
            is_broken: r.is_broken,
            temperature_setting: r.temperature_setting,
            reran_count: r.reran_count,
            load_weight_kg: r.load_weight_kg,
            load_type: r.load_type,
            comments: r.comments.clone(),
        }
    }
}

/// Keeps every report as a row in a single CSV file, oldest first.
///
/// The file and its header are created on the first append. A missing file
/// reads as an empty store.
pub struct CsvReportStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvReportStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load_rows(&self) -> Result<Vec<Report>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path).map_err(unavailable)?;
        let mut rdr = csv::Reader::from_reader(file);
        let mut rows = Vec::new();

        for result in rdr.deserialize() {
            let row: Row = result.map_err(unavailable)?;
            rows.push(Report::from(row));
        }

        Ok(rows)
    }

    fn append_row(&self, report: &Report) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(unavailable)?;
        }

        // An empty file left behind by an interrupted first write still
        // needs its header.
        let has_content = std::fs::metadata(&self.path)
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        debug!(path = %self.path.display(), has_content, "Appending CSV report");

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(unavailable)?;

        let mut writer = WriterBuilder::new()
            .has_headers(!has_content)
            .from_writer(file);

        writer.serialize(Row::from(report)).map_err(unavailable)?;
        writer.flush().map_err(unavailable)?;

        Ok(())
    }
}

fn unavailable(e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl ReportStore for CsvReportStore {
    async fn fetch_reports(&self, machine_id: MachineId) -> Result<Vec<Report>, StoreError> {
        let _guard = self.lock.lock().await;

        let mut reports: Vec<Report> = self
            .load_rows()?
            .into_iter()
            .filter(|r| r.machine_id == machine_id)
            .collect();
        reports.sort_by_key(|r| r.created_at);
        reports.reverse();

        Ok(reports)
    }

    async fn append_report(&self, candidate: NewReport) -> Result<Report, StoreError> {
        let _guard = self.lock.lock().await;

        let existing = self.load_rows()?;

        let mut created_at = Utc::now();
        if let Some(latest) = existing.iter().map(|r| r.created_at).max() {
            created_at = created_at.max(latest);
        }

        let id = ReportId::new((existing.len() + 1).to_string());
        let report = candidate.into_report(id, created_at);
        self.append_row(&report)?;

        Ok(report)
    }
}
