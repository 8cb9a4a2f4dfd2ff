//! End-to-end executor tests over in-memory source and sink doubles.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use trade_results_ingestor::fetcher::{ReportSource, SourceError};
use trade_results_ingestor::ingestor::RunError;
use trade_results_ingestor::parser::{ParseError, ReportParser};
use trade_results_ingestor::repository::{PersistError, RecordSink};
use trade_results_ingestor::shutdown::{SharedShutdown, ShutdownCoordinator};
use trade_results_ingestor::{IngestExecutor, PageTask, RawTradeRow, TradeRecord};

/// Scripted source: pages map to report hrefs, hrefs map to byte payloads.
/// Tracks how many link and report fetches happened.
struct MockSource {
    pages: u32,
    links: HashMap<u32, Vec<String>>,
    reports: HashMap<String, Bytes>,
    failing_reports: Vec<String>,
    shutdown_on_links: Option<(u32, SharedShutdown)>,
    link_calls: AtomicUsize,
    report_calls: AtomicUsize,
}

impl MockSource {
    fn new(pages: u32) -> Self {
        Self {
            pages,
            links: HashMap::new(),
            reports: HashMap::new(),
            failing_reports: Vec::new(),
            shutdown_on_links: None,
            link_calls: AtomicUsize::new(0),
            report_calls: AtomicUsize::new(0),
        }
    }

    fn with_report(mut self, page: u32, href: &str, payload: &str) -> Self {
        self.links
            .entry(page)
            .or_default()
            .push(href.to_string());
        self.reports
            .insert(href.to_string(), Bytes::from(payload.to_string()));
        self
    }

    /// Request shutdown from inside `page_links` for the given page,
    /// simulating a Ctrl+C that lands while that page is in flight.
    fn with_shutdown_on_links(mut self, page: u32, shutdown: SharedShutdown) -> Self {
        self.shutdown_on_links = Some((page, shutdown));
        self
    }

    fn with_failing_report(mut self, page: u32, href: &str) -> Self {
        self.links
            .entry(page)
            .or_default()
            .push(href.to_string());
        self.failing_reports.push(href.to_string());
        self
    }
}

#[async_trait]
impl ReportSource for MockSource {
    async fn enumerate_pages(&self) -> u32 {
        self.pages
    }

    fn page_url(&self, page: u32) -> String {
        format!("mock://listing?page={page}")
    }

    async fn page_links(&self, task: &PageTask) -> Result<Vec<String>, SourceError> {
        self.link_calls.fetch_add(1, Ordering::SeqCst);
        if let Some((page, shutdown)) = &self.shutdown_on_links {
            if *page == task.index {
                shutdown.request_shutdown();
            }
        }
        Ok(self.links.get(&task.index).cloned().unwrap_or_default())
    }

    async fn fetch_report(&self, href: &str) -> Result<Bytes, SourceError> {
        self.report_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_reports.iter().any(|f| f == href) {
            return Err(SourceError::ReportUnavailable(href.to_string()));
        }
        self.reports
            .get(href)
            .cloned()
            .ok_or_else(|| SourceError::ReportUnavailable(href.to_string()))
    }
}

/// Line parser: each line is `code;volume;total;count`. A payload starting
/// with `!` is unparseable.
struct LineParser;

impl ReportParser for LineParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<RawTradeRow>, ParseError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ParseError::NotText)?;
        if text.starts_with('!') {
            return Err(ParseError::NoSheet);
        }
        Ok(text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let mut parts = line.split(';');
                RawTradeRow {
                    exchange_product_id: parts.next().unwrap_or_default().to_string(),
                    exchange_product_name: "Product".to_string(),
                    delivery_basis_name: "Basis".to_string(),
                    volume: parts.next().map(str::to_string),
                    total: parts.next().map(str::to_string),
                    count: parts.next().map(str::to_string),
                    trade_date: NaiveDate::from_ymd_opt(2024, 6, 14),
                }
            })
            .collect())
    }
}

/// In-memory sink counting save calls; optionally fails every batch.
#[derive(Default)]
struct MemorySink {
    records: Mutex<Vec<TradeRecord>>,
    save_calls: AtomicUsize,
    fail: bool,
}

impl MemorySink {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn product_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.exchange_product_id.clone())
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn save(&self, batch: &[TradeRecord]) -> Result<u64, PersistError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PersistError::Database(sqlx::Error::PoolClosed));
        }
        self.records.lock().unwrap().extend_from_slice(batch);
        Ok(batch.len() as u64)
    }
}

fn executor(
    source: Arc<MockSource>,
    sink: Arc<MemorySink>,
) -> IngestExecutor {
    IngestExecutor::new(source, Arc::new(LineParser), sink)
        .with_concurrency(4)
        .with_fallback_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
}

#[tokio::test]
async fn test_failed_page_does_not_affect_siblings() {
    let source = Arc::new(
        MockSource::new(3)
            .with_report(1, "/r/one.xls", "A100ANK060F;60;4177440;17")
            .with_failing_report(2, "/r/two.xls")
            .with_report(3, "/r/three.xls", "A595ZLY005A;60;4177440;3"),
    );
    let sink = Arc::new(MemorySink::default());

    let outcome = executor(Arc::clone(&source), Arc::clone(&sink))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.pages_total, 3);
    assert_eq!(outcome.pages_failed, 1);
    assert_eq!(outcome.records_ingested, 2);
    assert_eq!(sink.product_ids(), vec!["A100ANK060F", "A595ZLY005A"]);
}

#[tokio::test]
async fn test_enumeration_failure_schedules_nothing() {
    let source = Arc::new(MockSource::new(0));
    let sink = Arc::new(MemorySink::default());

    let result = executor(Arc::clone(&source), Arc::clone(&sink)).run().await;

    assert!(matches!(result, Err(RunError::EnumerationFailed)));
    assert_eq!(source.link_calls.load(Ordering::SeqCst), 0);
    assert_eq!(sink.save_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_pages_never_touch_the_sink() {
    let source = Arc::new(MockSource::new(2));
    let sink = Arc::new(MemorySink::default());

    let outcome = executor(Arc::clone(&source), Arc::clone(&sink))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.pages_failed, 0);
    assert_eq!(outcome.records_ingested, 0);
    assert_eq!(source.link_calls.load(Ordering::SeqCst), 2);
    assert_eq!(sink.save_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unparseable_report_is_skipped_not_fatal() {
    let source = Arc::new(
        MockSource::new(1)
            .with_report(1, "/r/bad.xls", "!garbage")
            .with_report(1, "/r/good.xls", "A100ANK060F;60;4177440;17"),
    );
    let sink = Arc::new(MemorySink::default());

    let outcome = executor(Arc::clone(&source), Arc::clone(&sink))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.pages_failed, 0);
    assert_eq!(outcome.records_ingested, 1);
}

#[tokio::test]
async fn test_invalid_rows_dropped_from_batch() {
    // Second row has a short product code, third a non-numeric count.
    let payload = "A100ANK060F;60;4177440;17\nBAD;1;1;1\nA595ZLY005A;60;100;x";
    let source = Arc::new(MockSource::new(1).with_report(1, "/r/one.xls", payload));
    let sink = Arc::new(MemorySink::default());

    let outcome = executor(Arc::clone(&source), Arc::clone(&sink))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.pages_failed, 0);
    assert_eq!(outcome.records_ingested, 1);
    assert_eq!(sink.product_ids(), vec!["A100ANK060F"]);
}

#[tokio::test]
async fn test_persist_failure_marks_page_failed() {
    let source = Arc::new(MockSource::new(1).with_report(1, "/r/one.xls", "A100ANK060F;60;100;1"));
    let sink = Arc::new(MemorySink::failing());

    let outcome = executor(Arc::clone(&source), Arc::clone(&sink))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.pages_failed, 1);
    assert_eq!(outcome.records_ingested, 0);
    assert_eq!(sink.save_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mid_run_shutdown_stops_queued_pages() {
    // Shutdown lands while page 1 is in flight; with one permit, pages
    // 2..=5 are still queued behind the gate and must never run. Page 1
    // holds its permit and finishes normally.
    let shutdown = ShutdownCoordinator::shared();
    let source = Arc::new(
        MockSource::new(5)
            .with_report(1, "/r/one.xls", "A100ANK060F;60;4177440;17")
            .with_shutdown_on_links(1, Arc::clone(&shutdown)),
    );
    let sink = Arc::new(MemorySink::default());

    let outcome = executor(Arc::clone(&source), Arc::clone(&sink))
        .with_concurrency(1)
        .with_shutdown(shutdown)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.pages_total, 5);
    assert_eq!(outcome.pages_failed, 0);
    assert_eq!(outcome.records_ingested, 1);
    assert_eq!(source.link_calls.load(Ordering::SeqCst), 1);
    assert_eq!(sink.product_ids(), vec!["A100ANK060F"]);
}

#[tokio::test]
async fn test_shutdown_stops_scheduling_new_pages() {
    let source = Arc::new(MockSource::new(5));
    let sink = Arc::new(MemorySink::default());
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let outcome = executor(Arc::clone(&source), Arc::clone(&sink))
        .with_shutdown(shutdown)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.pages_total, 5);
    assert_eq!(source.link_calls.load(Ordering::SeqCst), 0);
    assert_eq!(sink.save_calls.load(Ordering::SeqCst), 0);
}
