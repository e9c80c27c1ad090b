//! Runtime settings read from the environment (and `.env`, loaded by the
//! binary before this runs).

use anyhow::{Context, Result, bail};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::report::MachineId;
use crate::summary::DEFAULT_WINDOW_SIZE;

/// Where reports live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Csv { path: PathBuf },
    Rest { url: String, key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub machines: BTreeSet<MachineId>,
    pub window_size: usize,
    pub backend: StoreBackend,
    pub fetch_timeout: Duration,
    pub concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            machines: (1..=4).collect(),
            window_size: DEFAULT_WINDOW_SIZE,
            backend: StoreBackend::Csv {
                path: PathBuf::from("data/reports.csv"),
            },
            fetch_timeout: Duration::from_secs(10),
            concurrency: 4,
        }
    }
}

impl Settings {
    /// Reads `DRYER_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from any variable source. Unset or empty variables
    /// keep their defaults; malformed ones are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut settings = Settings::default();

        if let Some(raw) = var("DRYER_MACHINES") {
            settings.machines = parse_machines(&raw)?;
        }

        if let Some(raw) = var("DRYER_WINDOW_SIZE") {
            settings.window_size = raw
                .trim()
                .parse()
                .with_context(|| {
                    format!("DRYER_WINDOW_SIZE must be a positive integer, got '{raw}'")
                })?;
            if settings.window_size == 0 {
                bail!("DRYER_WINDOW_SIZE must be a positive integer, got 0");
            }
        }

        if let Some(raw) = var("DRYER_FETCH_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| {
                    format!("DRYER_FETCH_TIMEOUT_SECS must be whole seconds, got '{raw}'")
                })?;
            settings.fetch_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = var("DRYER_CONCURRENCY") {
            settings.concurrency = raw
                .trim()
                .parse()
                .with_context(|| format!("DRYER_CONCURRENCY must be an integer, got '{raw}'"))?;
        }

        let backend = var("DRYER_STORE").unwrap_or_else(|| "csv".to_string());
        settings.backend = match backend.trim().to_ascii_lowercase().as_str() {
            "csv" => StoreBackend::Csv {
                path: var("DRYER_CSV_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("data/reports.csv")),
            },
            "rest" => StoreBackend::Rest {
                url: var("DRYER_STORE_URL")
                    .context("DRYER_STORE_URL must be set for the rest store")?,
                key: var("DRYER_STORE_KEY")
                    .context("DRYER_STORE_KEY must be set for the rest store")?,
            },
            other => bail!("DRYER_STORE must be 'csv' or 'rest', got '{other}'"),
        };

        Ok(settings)
    }
}

/// Parses a comma-separated list of positive machine numbers.
fn parse_machines(raw: &str) -> Result<BTreeSet<MachineId>> {
    let mut machines = BTreeSet::new();

    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id: MachineId = part
            .parse()
            .with_context(|| format!("invalid machine number '{part}' in DRYER_MACHINES"))?;
        if id == 0 {
            bail!("machine numbers start at 1, got 0 in DRYER_MACHINES");
        }
        machines.insert(id);
    }

    if machines.is_empty() {
        bail!("DRYER_MACHINES lists no machines");
    }

    Ok(machines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.machines.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(s.window_size, 5);
    }

    #[test]
    fn test_machines_are_sorted_and_deduplicated() {
        let s = settings(&[("DRYER_MACHINES", "7, 3,3 ,12")]).unwrap();
        assert_eq!(s.machines.into_iter().collect::<Vec<_>>(), vec![3, 7, 12]);
    }

    #[test]
    fn test_bad_machine_list() {
        assert!(settings(&[("DRYER_MACHINES", "1,two")]).is_err());
        assert!(settings(&[("DRYER_MACHINES", "0,1")]).is_err());
        assert!(settings(&[("DRYER_MACHINES", " , ")]).is_err());
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(settings(&[("DRYER_WINDOW_SIZE", "0")]).is_err());
        assert!(settings(&[("DRYER_WINDOW_SIZE", "-3")]).is_err());
    }

    #[test]
    fn test_rest_backend_requires_url_and_key() {
        assert!(settings(&[("DRYER_STORE", "rest")]).is_err());

        let s = settings(&[
            ("DRYER_STORE", "rest"),
            ("DRYER_STORE_URL", "https://example.test"),
            ("DRYER_STORE_KEY", "secret"),
        ])
        .unwrap();

        assert_eq!(
            s.backend,
            StoreBackend::Rest {
                url: "https://example.test".to_string(),
                key: "secret".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_backend() {
        assert!(settings(&[("DRYER_STORE", "postgres")]).is_err());
    }
}
