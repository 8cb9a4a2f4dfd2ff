//! HTTP fetching, listing crawl, and report sources
//!
//! The [`ReportSource`] trait is the seam between orchestration and the
//! origin site: one implementation per publication variant, selected by
//! configuration through [`create_source`].

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::config::{IngestConfig, SourceKind};
use crate::parser::{HtmlTableParser, ReportParser, SpreadsheetParser};
use crate::PageTask;

pub mod crawler;
pub mod http_client;
pub mod listing_source;

pub use crawler::ListingCrawler;
pub use http_client::FetchClient;
pub use listing_source::HttpReportSource;

/// Per-request fetch failures, classified for logging and counters.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,

    /// TCP/TLS connection could not be established
    #[error("connection failed")]
    Connection,

    /// Origin answered with a non-2xx status
    #[error("unexpected status {0}")]
    Status(u16),

    /// Response body could not be decoded as the expected content type
    #[error("unexpected content type")]
    ContentType,

    /// Anything else
    #[error("request failed: {0}")]
    Unknown(String),
}

impl FetchError {
    /// Classify a reqwest error into the fetch taxonomy.
    pub fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::Connection
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else if err.is_decode() {
            FetchError::ContentType
        } else {
            FetchError::Unknown(err.to_string())
        }
    }

    /// Stable label for the metrics counter.
    pub fn class(&self) -> &'static str {
        match self {
            FetchError::Timeout => "timeout",
            FetchError::Connection => "connection",
            FetchError::Status(_) => "status",
            FetchError::ContentType => "content_type",
            FetchError::Unknown(_) => "unknown",
        }
    }
}

/// Failures surfaced by a [`ReportSource`].
///
/// All of these are absorbed at the page boundary by the executor; none
/// crosses into sibling pages.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The listing page itself could not be fetched
    #[error("listing page {0} could not be fetched")]
    PageUnavailable(u32),

    /// A report file could not be fetched
    #[error("report `{0}` could not be fetched")]
    ReportUnavailable(String),

    /// A report URL fell outside the upload-path allow-list
    #[error("report url `{0}` outside the allowed upload prefix")]
    DisallowedUrl(String),
}

/// Errors building a source from configuration.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// A configured CSS selector did not parse
    #[error("invalid CSS selector `{0}`")]
    Selector(String),

    /// The HTTP client could not be constructed
    #[error("HTTP client setup failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// A source of paginated trading reports.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Total number of listing pages, read from the pagination control.
    ///
    /// Returns 0 when pagination is absent or unreadable; callers must treat
    /// 0 as "abort the run", not as a page count.
    async fn enumerate_pages(&self) -> u32;

    /// URL of a listing page by 1-based index.
    fn page_url(&self, page: u32) -> String;

    /// Report-file hrefs on one listing page, in listing order.
    ///
    /// An empty vector is a normal terminal state (a page with no reports).
    async fn page_links(&self, task: &PageTask) -> Result<Vec<String>, SourceError>;

    /// Download one report file. The href is joined with the file host and
    /// checked against the upload-path allow-list before any request.
    async fn fetch_report(&self, href: &str) -> Result<Bytes, SourceError>;
}

/// Build the source/parser pair for the configured publication variant.
///
/// One pipeline, two variants, selected by configuration rather than
/// duplicated code paths.
pub fn create_source(
    config: &IngestConfig,
) -> Result<(Arc<dyn ReportSource>, Arc<dyn ReportParser>), SetupError> {
    let client = FetchClient::new()?;
    let crawler = ListingCrawler::new(&config.link_selector)?;
    let source = Arc::new(HttpReportSource::new(config.clone(), client, crawler));

    let parser: Arc<dyn ReportParser> = match config.source_kind {
        SourceKind::Spreadsheet => Arc::new(SpreadsheetParser::new(
            config.layout.clone(),
            config.cutoff_date,
        )),
        SourceKind::HtmlTable => Arc::new(HtmlTableParser::new()),
    };

    Ok((source, parser))
}
