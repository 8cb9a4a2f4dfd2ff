//! Run configuration and source-contract constants
//!
//! Everything the pipeline treats as a contract with the origin site lives
//! here: URLs, the upload-path allow-list, the browser-like header set, and
//! the concurrency/timeout knobs. Components receive an [`IngestConfig`]
//! explicitly instead of reading globals.

use chrono::NaiveDate;

use crate::parser::ReportLayout;

/// Default listing page for published trading results.
pub const DEFAULT_BASE_URL: &str = "https://spimex.com/markets/oil_products/trades/results/";

/// Prefix that report-file hrefs are joined against. Listing hrefs are
/// relative (`/upload/reports/...`); joined with this prefix they land
/// inside the download allow-list.
pub const DEFAULT_FILE_HOST: &str = "https://spimex.com/files/trades/result";

/// Only file URLs under this prefix are ever downloaded. This is a safety
/// boundary: listing markup is attacker-influenced, the allow-list is ours.
pub const DEFAULT_ALLOWED_FILE_PREFIX: &str =
    "https://spimex.com/files/trades/result/upload/reports/";

/// CSS selector marking report-file anchors on a listing page.
pub const DEFAULT_LINK_SELECTOR: &str = "a.xls";

/// Reports dated before this boundary are ignored entirely.
/// Matches the original start-year setting (January 1st, 2023).
pub const DEFAULT_CUTOFF: (i32, u32, u32) = (2023, 1, 1);

/// Maximum in-flight page pipelines. 10 keeps the origin comfortable while
/// still saturating the parse pool on a typical backfill.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// HTTP connect timeout (seconds) - time to establish the TCP connection.
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// HTTP request timeout (seconds) - overall time for the entire request.
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Header set sent with every request. The origin rejects clients without a
/// browser-like User-Agent, and the language/cache headers keep responses
/// consistent with what the listing serves to browsers.
pub const REQUEST_HEADERS: &[(&str, &str)] = &[
    (
        "User-Agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36",
    ),
    ("Accept-Language", "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7"),
    ("Cache-Control", "no-cache"),
    ("Pragma", "no-cache"),
];

/// Which report variant the source publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceKind {
    /// Reports are binary spreadsheet attachments linked from each listing page
    Spreadsheet,
    /// Reports are HTML pages carrying a results table
    HtmlTable,
}

/// Configuration for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Listing page URL (page 1; other pages via `?page=N`)
    pub base_url: String,
    /// Host prefix for relative report-file hrefs
    pub file_host: String,
    /// Allow-list prefix for report downloads
    pub allowed_file_prefix: String,
    /// CSS selector for report-file anchors
    pub link_selector: String,
    /// Report variant to crawl
    pub source_kind: SourceKind,
    /// Reports older than this date are discarded
    pub cutoff_date: NaiveDate,
    /// Maximum concurrent page pipelines
    pub concurrency: usize,
    /// Column contract for spreadsheet reports
    pub layout: ReportLayout,
}

impl Default for IngestConfig {
    fn default() -> Self {
        let (y, m, d) = DEFAULT_CUTOFF;
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            file_host: DEFAULT_FILE_HOST.to_string(),
            allowed_file_prefix: DEFAULT_ALLOWED_FILE_PREFIX.to_string(),
            link_selector: DEFAULT_LINK_SELECTOR.to_string(),
            source_kind: SourceKind::Spreadsheet,
            cutoff_date: NaiveDate::from_ymd_opt(y, m, d)
                .unwrap_or_else(|| NaiveDate::from_ymd_opt(2023, 1, 1).expect("valid date")),
            concurrency: DEFAULT_CONCURRENCY,
            layout: ReportLayout::default(),
        }
    }
}

impl IngestConfig {
    /// URL of a listing page by 1-based index. Page 1 is the base URL itself.
    pub fn page_url(&self, page: u32) -> String {
        if page <= 1 {
            self.base_url.clone()
        } else {
            format!("{}?page={page}", self.base_url)
        }
    }
}
