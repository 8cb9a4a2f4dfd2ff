//! HTTP-backed report source
//!
//! Wires the fetch client and the listing crawler into the [`ReportSource`]
//! seam. Fetch errors are logged here with the offending URL and mapped to
//! [`SourceError`]; classification details live in the client.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, error};

use crate::config::IngestConfig;
use crate::fetcher::{FetchClient, ListingCrawler, ReportSource, SourceError};
use crate::PageTask;

/// Report source backed by the live listing site.
pub struct HttpReportSource {
    config: IngestConfig,
    client: FetchClient,
    crawler: ListingCrawler,
}

impl HttpReportSource {
    /// Create a source from configuration and its collaborators.
    pub fn new(config: IngestConfig, client: FetchClient, crawler: ListingCrawler) -> Self {
        Self {
            config,
            client,
            crawler,
        }
    }

    /// Join a (usually relative) href with the file host.
    fn file_url(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}{href}", self.config.file_host)
        }
    }
}

#[async_trait]
impl ReportSource for HttpReportSource {
    async fn enumerate_pages(&self) -> u32 {
        match self.client.fetch_page(&self.config.base_url).await {
            Ok(html) => self.crawler.total_pages(&html),
            Err(err) => {
                error!(url = %self.config.base_url, %err, "could not fetch base listing page");
                0
            }
        }
    }

    fn page_url(&self, page: u32) -> String {
        self.config.page_url(page)
    }

    async fn page_links(&self, task: &PageTask) -> Result<Vec<String>, SourceError> {
        let html = self.client.fetch_page(&task.url).await.map_err(|err| {
            error!(page = task.index, url = %task.url, %err, "listing page fetch failed");
            SourceError::PageUnavailable(task.index)
        })?;
        Ok(self.crawler.extract_links(&html))
    }

    async fn fetch_report(&self, href: &str) -> Result<Bytes, SourceError> {
        let url = self.file_url(href);

        // Safety boundary: listing markup must not steer us to arbitrary
        // resources. No request is made for URLs outside the allow-list.
        if !url.starts_with(&self.config.allowed_file_prefix) {
            debug!(%url, "report url outside allow-list");
            return Err(SourceError::DisallowedUrl(url));
        }

        self.client.fetch_file(&url).await.map_err(|err| {
            error!(%url, %err, "report file fetch failed");
            SourceError::ReportUnavailable(url.clone())
        })
    }
}
