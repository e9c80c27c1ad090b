use crate::fetch::client::HttpClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};

/// An [`HttpClient`] wrapper that signs every request with a service key.
///
/// PostgREST gateways such as Supabase expect the key twice: as an `apikey`
/// header and as an `Authorization: Bearer` token.
pub struct ApiKey<C> {
    inner: C,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl<C> ApiKey<C> {
    pub fn new(inner: C, key: &str) -> Result<Self> {
        let mut api_key =
            HeaderValue::from_str(key).context("API key is not a valid header value")?;
        api_key.set_sensitive(true);

        let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .context("API key is not a valid header value")?;
        bearer.set_sensitive(true);

        Ok(Self {
            inner,
            headers: vec![
                (HeaderName::from_static("apikey"), api_key),
                (AUTHORIZATION, bearer),
            ],
        })
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        for (name, value) in &self.headers {
            req.headers_mut().insert(name.clone(), value.clone());
        }
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;
    use std::time::Duration;

    #[test]
    fn test_rejects_key_with_newline() {
        let client = BasicClient::new(Duration::from_secs(1)).unwrap();
        assert!(ApiKey::new(client, "bad\nkey").is_err());
    }
}
