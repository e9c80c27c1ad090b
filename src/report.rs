//! Report records submitted by residents, and the candidate form used to
//! create them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::store::StoreError;

/// Facility machine number. Valid values are fixed per facility.
pub type MachineId = u32;

/// Longest accepted free-text comment, in characters.
pub const MAX_COMMENT_CHARS: usize = 2000;

/// Opaque identifier assigned by the store.
///
/// Hosted tables hand these back either as text (uuid) or as an integer
/// primary key; both decode into the same string-backed value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ReportId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => ReportId(s),
            RawId::Number(n) => ReportId(n.to_string()),
        })
    }
}

/// Dryer heat setting the reporter used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum TemperatureSetting {
    #[serde(rename = "no")]
    #[value(name = "no-heat", alias = "no")]
    NoHeat,
    #[serde(rename = "delicates")]
    Delicates,
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "med")]
    #[value(alias = "med")]
    Medium,
    #[serde(rename = "high")]
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LoadType {
    Clothes,
    Blankets,
    Towels,
    Mixed,
}

/// One observation about a machine. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub machine_id: MachineId,
    pub created_at: DateTime<Utc>,
    pub is_broken: bool,
    pub temperature_setting: TemperatureSetting,
    pub reran_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_type: Option<LoadType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

/// A report as submitted, before the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReport {
    pub machine_id: MachineId,
    pub is_broken: bool,
    pub temperature_setting: TemperatureSetting,
    pub reran_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_type: Option<LoadType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl NewReport {
    pub fn new(
        machine_id: MachineId,
        is_broken: bool,
        temperature_setting: TemperatureSetting,
    ) -> Self {
        Self {
            machine_id,
            is_broken,
            temperature_setting,
            reran_count: 0,
            load_weight_kg: None,
            load_type: None,
            comments: None,
        }
    }

    /// Checks the candidate against the facility's machine set and field
    /// bounds, returning it with blank comments dropped.
    pub fn validate(mut self, facility: &BTreeSet<MachineId>) -> Result<Self, StoreError> {
        if !facility.contains(&self.machine_id) {
            return Err(StoreError::ValidationRejected(format!(
                "unknown machine {}",
                self.machine_id
            )));
        }

        if let Some(weight) = self.load_weight_kg {
            if !weight.is_finite() || weight < 0.0 {
                return Err(StoreError::ValidationRejected(format!(
                    "load weight must be a non-negative number, got {weight}"
                )));
            }
        }

        self.comments = self
            .comments
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        if let Some(comments) = &self.comments {
            let len = comments.chars().count();
            if len > MAX_COMMENT_CHARS {
                return Err(StoreError::ValidationRejected(format!(
                    "comments too long: {len} characters (max {MAX_COMMENT_CHARS})"
                )));
            }
        }

        Ok(self)
    }

    /// Materializes the stored record once the store has picked an id and time.
    pub fn into_report(self, id: ReportId, created_at: DateTime<Utc>) -> Report {
        Report {
            id,
            machine_id: self.machine_id,
            created_at,
            is_broken: self.is_broken,
            temperature_setting: self.temperature_setting,
            reran_count: self.reran_count,
            load_weight_kg: self.load_weight_kg,
            load_type: self.load_type,
            comments: self.comments,
        }
    }
}
