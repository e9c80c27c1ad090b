use super::client::HttpClient;
use async_trait::async_trait;
use std::time::Duration;

/// Plain `reqwest` client with request and connect timeouts.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()?;
        Ok(Self(client))
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}
