//! Ingest executor
//!
//! Owns the run lifecycle and the two concurrency gates: a counting
//! semaphore over in-flight page pipelines (bounds HTTP connections and
//! held parse buffers) and a cores-sized semaphore over blocking parse
//! workers (keeps spreadsheet decoding from stalling the I/O tasks).

use chrono::{NaiveDate, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use metrics::counter;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_CONCURRENCY;
use crate::fetcher::{ReportSource, SourceError};
use crate::ingestor::{PageError, RunError, RunOutcome, RunPhase};
use crate::metrics::{
    PAGES_FAILED, RECORDS_INGESTED, REPORTS_DISALLOWED, REPORTS_SKIPPED, ROWS_REJECTED,
};
use crate::normalizer::normalize;
use crate::parser::ReportParser;
use crate::repository::RecordSink;
use crate::shutdown::SharedShutdown;
use crate::{PageTask, TradeRecord};

/// Result of one page pipeline after absorption.
#[derive(Debug)]
struct PageReport {
    records_saved: u64,
    failed: bool,
}

/// Orchestrates a complete ingestion run.
pub struct IngestExecutor {
    source: Arc<dyn ReportSource>,
    parser: Arc<dyn ReportParser>,
    sink: Arc<dyn RecordSink>,
    concurrency: usize,
    fallback_date: NaiveDate,
    shutdown: Option<SharedShutdown>,
    show_progress: bool,
}

impl IngestExecutor {
    /// Create an executor over a source, parser, and sink.
    pub fn new(
        source: Arc<dyn ReportSource>,
        parser: Arc<dyn ReportParser>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            source,
            parser,
            sink,
            concurrency: DEFAULT_CONCURRENCY,
            fallback_date: Utc::now().date_naive(),
            shutdown: None,
            show_progress: false,
        }
    }

    /// Cap simultaneous in-flight page pipelines.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Trade date assigned to rows whose report embeds none.
    pub fn with_fallback_date(mut self, date: NaiveDate) -> Self {
        self.fallback_date = date;
        self
    }

    /// Attach a shared shutdown handle; a request stops scheduling of new
    /// pages while in-flight pages finish.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Show an interactive page-level progress bar.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Execute the run.
    ///
    /// Returns `Err` only for terminal enumeration failure. Per-page
    /// failures are absorbed and reported through [`RunOutcome`].
    pub async fn run(&self) -> Result<RunOutcome, RunError> {
        info!(phase = ?RunPhase::Enumerating, "discovering page count");
        let pages_total = self.source.enumerate_pages().await;
        if pages_total == 0 {
            error!(phase = ?RunPhase::Aborted, "no pages to process, aborting run");
            return Err(RunError::EnumerationFailed);
        }

        info!(phase = ?RunPhase::Crawling, pages_total, concurrency = self.concurrency, "scheduling page pipelines");

        let page_gate = Arc::new(Semaphore::new(self.concurrency));
        let parse_gate = Arc::new(Semaphore::new(
            std::thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(4),
        ));

        let bar = if self.show_progress {
            let bar = ProgressBar::new(u64::from(pages_total));
            bar.set_style(
                ProgressStyle::with_template("{bar:40} {pos}/{len} pages {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        let mut tasks = JoinSet::new();
        for page in 1..=pages_total {
            // The permit is taken here, before spawning, so a shutdown
            // request stops pages queued behind the gate, not only pages
            // that were never scheduled. In-flight pages hold their permit
            // and finish normally.
            let permit = match &self.shutdown {
                Some(shutdown) => {
                    let gate = Arc::clone(&page_gate);
                    tokio::select! {
                        biased;
                        _ = shutdown.wait_for_shutdown() => {
                            warn!(page, "shutdown requested, not scheduling remaining pages");
                            break;
                        }
                        permit = gate.acquire_owned() => permit.ok(),
                    }
                }
                // The gate is never closed, so acquisition only ever waits.
                None => Arc::clone(&page_gate).acquire_owned().await.ok(),
            };

            let task = PageTask::new(page, self.source.page_url(page));
            let source = Arc::clone(&self.source);
            let parser = Arc::clone(&self.parser);
            let sink = Arc::clone(&self.sink);
            let parse_gate = Arc::clone(&parse_gate);
            let fallback_date = self.fallback_date;

            tasks.spawn(async move {
                let _permit = permit;
                process_page(source, parser, sink, parse_gate, task, fallback_date).await
            });
        }

        let mut outcome = RunOutcome {
            pages_total,
            ..RunOutcome::default()
        };

        while let Some(joined) = tasks.join_next().await {
            bar.inc(1);
            match joined {
                Ok(report) => {
                    if report.failed {
                        outcome.pages_failed += 1;
                        counter!(PAGES_FAILED).increment(1);
                    }
                    outcome.records_ingested += report.records_saved;
                    counter!(RECORDS_INGESTED).increment(report.records_saved);
                }
                Err(err) => {
                    // A panicked page task counts as a failed page.
                    error!(%err, "page task did not complete");
                    outcome.pages_failed += 1;
                    counter!(PAGES_FAILED).increment(1);
                }
            }
        }
        bar.finish_and_clear();

        info!(
            phase = ?RunPhase::Done,
            pages_total = outcome.pages_total,
            pages_failed = outcome.pages_failed,
            records_ingested = outcome.records_ingested,
            "run complete"
        );
        Ok(outcome)
    }
}

/// Drive one page pipeline, absorbing its failure.
async fn process_page(
    source: Arc<dyn ReportSource>,
    parser: Arc<dyn ReportParser>,
    sink: Arc<dyn RecordSink>,
    parse_gate: Arc<Semaphore>,
    task: PageTask,
    fallback_date: NaiveDate,
) -> PageReport {
    let page = task.index;
    match ingest_page(source, parser, sink, parse_gate, task, fallback_date).await {
        Ok(records_saved) => PageReport {
            records_saved,
            failed: false,
        },
        Err(err) => {
            warn!(page, %err, "page pipeline failed");
            PageReport {
                records_saved: 0,
                failed: true,
            }
        }
    }
}

/// Fetch, parse, normalize, and persist everything one listing page offers.
///
/// Fetch and persist failures end the page early; an unparseable file and
/// invalid rows are skipped with a log line, the page continues.
async fn ingest_page(
    source: Arc<dyn ReportSource>,
    parser: Arc<dyn ReportParser>,
    sink: Arc<dyn RecordSink>,
    parse_gate: Arc<Semaphore>,
    task: PageTask,
    fallback_date: NaiveDate,
) -> Result<u64, PageError> {
    let links = source.page_links(&task).await?;
    if links.is_empty() {
        debug!(page = task.index, "no reports listed on page");
        return Ok(0);
    }

    let mut batch: Vec<TradeRecord> = Vec::new();
    for href in &links {
        let bytes = match source.fetch_report(href).await {
            Ok(bytes) => bytes,
            Err(SourceError::DisallowedUrl(url)) => {
                // Repeated hits here mean the file host and allow-list
                // prefixes disagree.
                warn!(page = task.index, %url, "skipping report url outside allow-list");
                counter!(REPORTS_DISALLOWED).increment(1);
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let permit = parse_gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| PageError::ParseWorker(e.to_string()))?;
        let parser = Arc::clone(&parser);
        let parsed = tokio::task::spawn_blocking(move || {
            let rows = parser.parse(&bytes);
            drop(permit);
            rows
        })
        .await
        .map_err(|e| PageError::ParseWorker(e.to_string()))?;

        let rows = match parsed {
            Ok(rows) => rows,
            Err(err) => {
                warn!(page = task.index, report = %href, %err, "skipping unparseable report");
                counter!(REPORTS_SKIPPED).increment(1);
                continue;
            }
        };

        for row in &rows {
            match normalize(row, fallback_date) {
                Ok(record) => batch.push(record),
                Err(err) => {
                    debug!(page = task.index, %err, "dropping invalid row");
                    counter!(ROWS_REJECTED).increment(1);
                }
            }
        }
    }

    if batch.is_empty() {
        debug!(page = task.index, "page yielded no records");
        return Ok(0);
    }

    // One transaction per page: a bad page loses at most its own records.
    let saved = sink.save(&batch).await?;
    Ok(saved)
}
