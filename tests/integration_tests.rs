use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use dryer_status::level::{LatestState, StatusLevel};
use dryer_status::report::{LoadType, NewReport, TemperatureSetting};
use dryer_status::service::StatusService;
use dryer_status::store::{CsvReportStore, MemoryReportStore, ReportStore, StoreError};
use dryer_status::summary::{DEFAULT_WINDOW_SIZE, summarize};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

fn facility() -> BTreeSet<u32> {
    (1..=4).collect()
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap()
}

/// A store whose clock the test can move.
fn store_with_clock() -> (MemoryReportStore, Arc<Mutex<DateTime<Utc>>>) {
    let clock = Arc::new(Mutex::new(start()));
    let reader = clock.clone();
    let store = MemoryReportStore::with_clock(move || *reader.lock().unwrap());
    (store, clock)
}

#[tokio::test]
async fn test_submit_then_status() {
    let (store, clock) = store_with_clock();
    let service = StatusService::new(Arc::new(store), facility());

    // Ten days ago: only visible in the recent window.
    *clock.lock().unwrap() = start() - TimeDelta::days(10);
    service
        .submit(NewReport::new(1, true, TemperatureSetting::High))
        .await
        .unwrap();

    // Three days ago: recent window and week.
    *clock.lock().unwrap() = start() - TimeDelta::days(3);
    service
        .submit(NewReport::new(1, false, TemperatureSetting::Low))
        .await
        .unwrap();

    // Today.
    *clock.lock().unwrap() = start();
    let mut candidate = NewReport::new(1, true, TemperatureSetting::Medium);
    candidate.load_type = Some(LoadType::Towels);
    candidate.comments = Some("  stops after five minutes ".to_string());
    let latest = service.submit(candidate).await.unwrap();
    assert_eq!(latest.comments.as_deref(), Some("stops after five minutes"));

    let now = start() + TimeDelta::hours(2);
    let statuses = service.summaries(&now).await.unwrap();

    let ids: Vec<_> = statuses.iter().map(|s| s.machine_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    let one = statuses[0].outcome.as_ref().unwrap();
    assert_eq!(one.recent_reports_total, 3);
    assert_eq!(one.recent_reports_broken, 2);
    assert_eq!(one.total_today, 1);
    assert_eq!(one.broken_today, 1);
    assert_eq!(one.total_last_7_days, 2);
    assert_eq!(one.broken_last_7_days, 1);
    assert_eq!(one.latest_report.as_ref(), Some(&latest));
    assert_eq!(one.latest_state(), LatestState::Broken);
    assert_eq!(one.recent_broken_pct(), 67);
    assert_eq!(one.level(), StatusLevel::Elevated);

    let two = statuses[1].outcome.as_ref().unwrap();
    assert_eq!(two.latest_state(), LatestState::NoReports);
    assert_eq!(two.level(), StatusLevel::Clear);
}

#[tokio::test]
async fn test_recent_window_slides() {
    let (store, clock) = store_with_clock();
    let service =
        StatusService::new(Arc::new(store), facility()).with_window_size(DEFAULT_WINDOW_SIZE);

    for (i, broken) in [true, true, true, false, false, false, false, false]
        .into_iter()
        .enumerate()
    {
        *clock.lock().unwrap() = start() + TimeDelta::minutes(i as i64);
        service
            .submit(NewReport::new(3, broken, TemperatureSetting::Delicates))
            .await
            .unwrap();
    }

    let reports = service.machine_reports(3).await.unwrap();
    assert_eq!(reports.len(), 8);
    assert!(reports.windows(2).all(|w| w[0].created_at >= w[1].created_at));

    let now = start() + TimeDelta::hours(1);
    let summary = summarize(3, &reports, &now, DEFAULT_WINDOW_SIZE).unwrap();

    assert_eq!(summary.recent_reports_total, 5);
    assert_eq!(summary.recent_reports_broken, 0);
    assert_eq!(summary.total_today, 8);
    assert_eq!(summary.broken_today, 3);
    assert_eq!(summary.latest_state(), LatestState::Working);
}

#[tokio::test]
async fn test_csv_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reports.csv");

    {
        let service = StatusService::new(Arc::new(CsvReportStore::new(&path)), facility());
        service
            .submit(NewReport::new(2, true, TemperatureSetting::NoHeat))
            .await
            .unwrap();
    }

    let reopened = CsvReportStore::new(&path);
    let reports = reopened.fetch_reports(2).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_broken);

    let err = StatusService::new(Arc::new(reopened), facility())
        .submit(NewReport::new(5, true, TemperatureSetting::NoHeat))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ValidationRejected(_)));
}
