//! CLI entry point for the dryer status tool.
//!
//! Provides subcommands for viewing the facility's machine status, listing a
//! single machine's reports, and submitting a new report.

use anyhow::{Result, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use dryer_status::{
    config::{Settings, StoreBackend},
    fetch::{ApiKey, BasicClient},
    output::{log_report, log_status, log_summary, render_json},
    report::{LoadType, MachineId, NewReport, TemperatureSetting},
    service::StatusService,
    store::{CsvReportStore, ReportStore, RestReportStore},
    summary::summarize,
};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "dryer_status")]
#[command(about = "Report and view the state of shared laundry dryers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a status summary for every machine
    Status {
        /// Print JSON instead of log lines
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List one machine's reports, newest first
    Machine {
        #[arg(value_name = "ID")]
        machine_id: MachineId,

        /// Print JSON instead of log lines
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Submit a report about a machine
    Report {
        /// Machine number
        #[arg(short, long)]
        machine: MachineId,

        /// The machine is broken (omit if it worked)
        #[arg(short, long, default_value_t = false)]
        broken: bool,

        /// Heat setting used
        #[arg(short, long, value_enum)]
        temperature: TemperatureSetting,

        /// Times the load had to be re-run
        #[arg(short, long, default_value_t = 0)]
        reran: u32,

        /// Load weight in kilograms
        #[arg(short, long)]
        weight: Option<f64>,

        /// Kind of load
        #[arg(short, long, value_enum)]
        load_type: Option<LoadType>,

        /// Free-text comments
        #[arg(short, long)]
        comments: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/dryer_status.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("dryer_status.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    info!(
        machines = ?settings.machines,
        window_size = settings.window_size,
        "Settings loaded"
    );

    match settings.backend.clone() {
        StoreBackend::Csv { path } => {
            info!(path = %path.display(), "Using CSV report store");
            run(CsvReportStore::new(path), &settings, cli.command).await
        }
        StoreBackend::Rest { url, key } => {
            info!(url = %url, "Using hosted report store");
            let client = ApiKey::new(BasicClient::new(settings.fetch_timeout)?, &key)?;
            run(RestReportStore::new(&url, client)?, &settings, cli.command).await
        }
    }
}

async fn run<S: ReportStore + 'static>(
    store: S,
    settings: &Settings,
    command: Commands,
) -> Result<()> {
    let service = StatusService::new(Arc::new(store), settings.machines.clone())
        .with_window_size(settings.window_size)
        .with_fetch_timeout(settings.fetch_timeout)
        .with_concurrency(settings.concurrency);

    match command {
        Commands::Status { json } => {
            let statuses = service.summaries(&Local::now()).await?;

            if json {
                println!("{}", render_json(&statuses)?);
            } else {
                statuses.iter().for_each(log_status);
            }

            let failed = statuses.iter().filter(|s| s.outcome.is_err()).count();
            if failed > 0 {
                bail!("{failed} of {} machines could not be summarized", statuses.len());
            }
        }
        Commands::Machine { machine_id, json } => {
            let reports = service.machine_reports(machine_id).await?;
            let summary = summarize(machine_id, &reports, &Local::now(), settings.window_size)?;

            if json {
                let body = serde_json::json!({ "summary": summary.view(), "reports": reports });
                println!("{}", render_json(&body)?);
            } else {
                log_summary(&summary);
                if reports.is_empty() {
                    info!(machine_id, "No reports yet for this machine");
                }
                reports.iter().for_each(log_report);
            }
        }
        Commands::Report {
            machine,
            broken,
            temperature,
            reran,
            weight,
            load_type,
            comments,
        } => {
            let candidate = NewReport {
                machine_id: machine,
                is_broken: broken,
                temperature_setting: temperature,
                reran_count: reran,
                load_weight_kg: weight,
                load_type,
                comments,
            };

            let report = service.submit(candidate).await?;
            log_report(&report);
        }
    }

    Ok(())
}
