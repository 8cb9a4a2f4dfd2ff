//! Run orchestration
//!
//! The ingest executor drives the end-to-end run:
//!
//! 1. **Enumeration**: read the total page count from the listing pagination
//! 2. **Scheduling**: one task per page, gated by a counting semaphore
//! 3. **Page pipeline**: fetch listing → extract links → fetch files →
//!    parse (offloaded to a blocking worker) → normalize → save batch
//! 4. **Aggregation**: join all page tasks into a [`RunOutcome`]
//!
//! Failures never cross a page-task boundary: a failed page is logged and
//! counted, sibling pages are unaffected. Only enumeration failure is
//! terminal ([`RunError::EnumerationFailed`]).

pub mod executor;

pub use executor::IngestExecutor;

use serde::Serialize;

use crate::fetcher::SourceError;
use crate::repository::PersistError;

/// Phase of an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Nothing started yet
    Init,
    /// Reading the page count from the listing pagination
    Enumerating,
    /// Page pipelines in flight
    Crawling,
    /// All page tasks joined
    Done,
    /// Enumeration failed; no page task was scheduled
    Aborted,
}

/// Terminal run failures.
///
/// Everything below enumeration is absorbed per page; a run that enumerated
/// successfully always reports success plus aggregate counters.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// No pagination found on the listing page; structural site change
    /// needing human attention, not retried
    #[error("listing pagination could not be enumerated")]
    EnumerationFailed,
}

/// Failures inside one page pipeline. Absorbed by the executor.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    /// Listing page or report file unavailable
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The page's batch could not be persisted; transaction rolled back
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// The blocking parse worker failed to join
    #[error("parse worker failed: {0}")]
    ParseWorker(String),
}

/// Aggregate outcome of one run.
///
/// The executor does not distinguish "all pages succeeded" from "some pages
/// silently failed"; callers needing stronger guarantees inspect these
/// counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    /// Pages reported by the listing pagination
    pub pages_total: u32,
    /// Pages whose pipeline failed and was absorbed
    pub pages_failed: u32,
    /// Records committed across all batches
    pub records_ingested: u64,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} pages ({} failed), {} records ingested",
            self.pages_total, self.pages_failed, self.records_ingested
        )
    }
}
