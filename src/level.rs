use serde::Serialize;
use std::fmt;

/// Percentage of `broken` in `total`, rounded to the nearest whole percent.
/// Returns 0 when there is nothing to divide by.
pub fn broken_pct(broken: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (broken.min(total) as f64 / total as f64) * 100.0;
    pct.round() as u8
}

/// How worried residents should be about a machine.
///
/// | Broken %   | Level      |
/// |------------|------------|
/// | 0          | Clear      |
/// | 1 – 25     | Low        |
/// | 26 – 75    | Elevated   |
/// | > 75       | High       |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Clear,
    Low,
    Elevated,
    High,
}

impl StatusLevel {
    pub fn from_pct(pct: u8) -> Self {
        match pct {
            0 => StatusLevel::Clear,
            p if p <= 25 => StatusLevel::Low,
            p if p <= 75 => StatusLevel::Elevated,
            _ => StatusLevel::High,
        }
    }
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StatusLevel::Clear => "clear",
            StatusLevel::Low => "low",
            StatusLevel::Elevated => "elevated",
            StatusLevel::High => "high",
        })
    }
}

/// What the most recent report said.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LatestState {
    Broken,
    Working,
    NoReports,
}

impl fmt::Display for LatestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LatestState::Broken => "Broken",
            LatestState::Working => "Working",
            LatestState::NoReports => "No reports",
        })
    }
}
