//! Rendering of summaries and reports.
//!
//! Supports structured log lines and pretty JSON.

use anyhow::Result;
use serde::Serialize;
use tracing::{error, info};

use crate::report::Report;
use crate::summary::{MachineStatus, MachineSummary};

/// Serializes any summary or report list as pretty-printed JSON.
pub fn render_json(value: &impl Serialize) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// One human-readable line describing the recent window.
pub fn recent_line(summary: &MachineSummary) -> String {
    format!(
        "Reported broken {} out of the last {} times",
        summary.recent_reports_broken, summary.recent_reports_total
    )
}

/// Logs a summary with its derived percentages and level.
pub fn log_summary(summary: &MachineSummary) {
    info!(
        machine_id = summary.machine_id,
        state = %summary.latest_state(),
        level = %summary.level(),
        today_pct = summary.today_broken_pct(),
        week_pct = summary.week_broken_pct(),
        "{}",
        recent_line(summary)
    );
}

pub fn log_status(status: &MachineStatus) {
    match &status.outcome {
        Ok(summary) => log_summary(summary),
        Err(e) => error!(machine_id = status.machine_id, error = %e, "Machine status unavailable"),
    }
}

pub fn log_report(report: &Report) {
    info!(
        id = %report.id,
        machine_id = report.machine_id,
        created_at = %report.created_at,
        is_broken = report.is_broken,
        temperature = ?report.temperature_setting,
        reran_count = report.reran_count,
        load_weight_kg = ?report.load_weight_kg,
        load_type = ?report.load_type,
        comments = report.comments.as_deref().unwrap_or(""),
        "Report"
    );
}
