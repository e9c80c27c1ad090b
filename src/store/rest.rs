use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, StatusCode, Url};
use tracing::{debug, warn};

use super::{ReportStore, StoreError};
use crate::fetch::HttpClient;
use crate::report::{MachineId, NewReport, Report};

const REPORTS_PATH: &str = "rest/v1/reports";

/// Reports kept in a hosted PostgREST table (e.g. Supabase).
///
/// The server assigns `id` and `created_at`; the client never sends a
/// timestamp of its own.
pub struct RestReportStore<C> {
    client: C,
    reports_url: Url,
}

impl<C: HttpClient> RestReportStore<C> {
    pub fn new(base_url: &str, client: C) -> Result<Self> {
        let mut base =
            Url::parse(base_url).with_context(|| format!("invalid store URL '{base_url}'"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let reports_url = base.join(REPORTS_PATH)?;

        Ok(Self {
            client,
            reports_url,
        })
    }

    fn fetch_request(&self, machine_id: MachineId) -> Request {
        let mut url = self.reports_url.clone();
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("machine_id", &format!("eq.{machine_id}"))
            .append_pair("order", "created_at.desc");

        let mut req = Request::new(Method::GET, url);
        req.headers_mut()
            .insert(ACCEPT, HeaderValue::from_static("application/json"));
        req
    }

    fn append_request(&self, candidate: &NewReport) -> Result<Request, StoreError> {
        let body = serde_json::to_vec(candidate)
            .map_err(|e| StoreError::ValidationRejected(e.to_string()))?;

        let mut req = Request::new(Method::POST, self.reports_url.clone());
        let headers = req.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("prefer", HeaderValue::from_static("return=representation"));
        *req.body_mut() = Some(body.into());
        Ok(req)
    }

    async fn send(&self, req: Request) -> Result<reqwest::Response, StoreError> {
        self.client
            .execute(req)
            .await
            .map_err(|e| StoreError::Unavailable(format!("request failed: {e}")))
    }
}

async fn error_body(resp: reqwest::Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    format!("status {status}: {body}")
}

#[async_trait]
impl<C: HttpClient> ReportStore for RestReportStore<C> {
    #[tracing::instrument(skip(self))]
    async fn fetch_reports(&self, machine_id: MachineId) -> Result<Vec<Report>, StoreError> {
        let resp = self.send(self.fetch_request(machine_id)).await?;

        if !resp.status().is_success() {
            let detail = error_body(resp).await;
            warn!(%detail, "Report fetch refused");
            return Err(StoreError::Unavailable(detail));
        }

        let reports: Vec<Report> = resp
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(format!("undecodable reports: {e}")))?;

        debug!(count = reports.len(), "Reports fetched");
        Ok(reports)
    }

    #[tracing::instrument(skip(self, candidate), fields(machine_id = candidate.machine_id))]
    async fn append_report(&self, candidate: NewReport) -> Result<Report, StoreError> {
        let resp = self.send(self.append_request(&candidate)?).await?;
        let status = resp.status();

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(StoreError::Unavailable(error_body(resp).await));
        }
        if !status.is_success() {
            return Err(StoreError::ValidationRejected(error_body(resp).await));
        }

        let mut created: Vec<Report> = resp
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(format!("undecodable report: {e}")))?;

        if created.is_empty() {
            return Err(StoreError::Unavailable(
                "store accepted the report but returned no row".to_string(),
            ));
        }

        let report = created.swap_remove(0);
        debug!(id = %report.id, "Report stored");
        Ok(report)
    }
}
