//! HTTP fetch client
//!
//! One shared reqwest client per run, configured with the browser-like
//! header set and explicit timeouts. Errors are classified into the
//! [`FetchError`] taxonomy and counted; retry policy, if any, belongs to
//! callers.

use bytes::Bytes;
use metrics::counter;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::{HTTP_CONNECT_TIMEOUT_SECS, HTTP_REQUEST_TIMEOUT_SECS, REQUEST_HEADERS};
use crate::fetcher::FetchError;
use crate::metrics::FETCH_ERRORS;

/// HTTP client for listing pages and report files.
///
/// reqwest's `Client` is an `Arc` internally, so cloning is cheap and the
/// connection pool is shared read-only across all concurrent page tasks.
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: Client,
}

impl FetchClient {
    /// Build a client with default headers and timeouts.
    pub fn new() -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        for (name, value) in REQUEST_HEADERS {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client })
    }

    /// Fetch a listing page as text.
    pub async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        debug!(%url, "fetching page");
        let response = self.send(url).await?;
        response.text().await.map_err(|e| self.record(&e))
    }

    /// Fetch a report file as bytes.
    pub async fn fetch_file(&self, url: &str) -> Result<Bytes, FetchError> {
        debug!(%url, "fetching file");
        let response = self.send(url).await?;
        response.bytes().await.map_err(|e| self.record(&e))
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.record(&e))?;

        let status = response.status();
        if !status.is_success() {
            let err = FetchError::Status(status.as_u16());
            counter!(FETCH_ERRORS, "class" => err.class()).increment(1);
            return Err(err);
        }

        Ok(response)
    }

    fn record(&self, err: &reqwest::Error) -> FetchError {
        let classified = FetchError::classify(err);
        counter!(FETCH_ERRORS, "class" => classified.class()).increment(1);
        classified
    }
}
