//! # Trade Results Ingestor Library
//!
//! Retrieves periodically published commodity-exchange trading reports from a
//! paginated listing site, extracts structured trade records from the attached
//! tabular report files, and persists them to Postgres.
//!
//! ## Architecture
//!
//! The library is organized into several core modules:
//!
//! - [`config`] - Run configuration and documented source-contract constants
//! - [`fetcher`] - HTTP fetch client, listing crawler, and report sources
//! - [`parser`] - Report file parsers (spreadsheet attachment, HTML table)
//! - [`normalizer`] - Raw row to [`TradeRecord`] coercion and validation
//! - [`repository`] - Transactional batch persistence (sqlx/Postgres)
//! - [`ingestor`] - Run orchestration with bounded page concurrency
//! - [`shutdown`] - Graceful shutdown coordination
//! - [`metrics`] - Counters and optional Prometheus exporter
//!
//! ## Pipeline
//!
//! ```text
//! enumerate pages -> per page (gated): fetch listing -> extract report links
//!                 -> fetch file -> parse rows -> normalize -> save batch
//! ```
//!
//! Failures are absorbed at the page boundary: a bad page, file, or row is
//! logged and counted, never propagated across sibling pages. Only a failed
//! page-count enumeration aborts a run.

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// CLI command implementations
pub mod cli;

/// Run configuration and source-contract constants
pub mod config;

/// HTTP fetching, listing crawl, and report sources
pub mod fetcher;

/// Run orchestration
pub mod ingestor;

/// Observability counters
pub mod metrics;

/// Raw row normalization
pub mod normalizer;

/// Report file parsers
pub mod parser;

/// Batch persistence
pub mod repository;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

// Re-export the most commonly used types
pub use ingestor::{IngestExecutor, RunOutcome};
pub use normalizer::normalize;

/// Minimum product-code length that still decomposes into oil id (4),
/// delivery basis id (3), and delivery type id (1).
pub const MIN_PRODUCT_ID_LEN: usize = 8;

/// A single normalized exchange trade record, the unit persisted.
///
/// Constructed once by [`normalizer::normalize`] from a single source row and
/// never mutated afterwards. `created_at` is stamped by the repository at
/// persistence time; `updated_at` stays NULL during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeRecord {
    /// Composite exchange product code (typically 10-12 chars)
    pub exchange_product_id: String,
    /// Human-readable product name
    pub exchange_product_name: String,
    /// First 4 chars of the product code
    pub oil_id: String,
    /// Chars 5-7 of the product code
    pub delivery_basis_id: String,
    /// Delivery basis name as printed in the report
    pub delivery_basis_name: String,
    /// Last char of the product code
    pub delivery_type_id: String,
    /// Contract volume, metric tons
    pub volume: Decimal,
    /// Total traded amount
    pub total: Decimal,
    /// Number of contracts, always >= 1
    pub count: i64,
    /// Date the report covers
    pub trade_date: NaiveDate,
}

impl TradeRecord {
    /// Validate record integrity.
    ///
    /// The normalizer only ever produces records that pass this; it exists as
    /// an explicit check for tests and for records built by hand.
    pub fn validate(&self) -> Result<(), String> {
        let id = &self.exchange_product_id;
        if !id.is_ascii() || id.len() < MIN_PRODUCT_ID_LEN {
            return Err(format!(
                "Product code `{id}` does not decompose (need >= {MIN_PRODUCT_ID_LEN} ASCII chars)"
            ));
        }

        if id[..4] != *self.oil_id
            || id[4..7] != *self.delivery_basis_id
            || id[id.len() - 1..] != *self.delivery_type_id
        {
            return Err(format!(
                "Derived ids ({}/{}/{}) are not slices of product code `{id}`",
                self.oil_id, self.delivery_basis_id, self.delivery_type_id
            ));
        }

        if self.count < 1 {
            return Err(format!("Count must be >= 1, got {}", self.count));
        }

        if self.volume < Decimal::ZERO {
            return Err(format!("Volume must be non-negative, got {}", self.volume));
        }

        if self.total < Decimal::ZERO {
            return Err(format!("Total must be non-negative, got {}", self.total));
        }

        Ok(())
    }
}

/// A raw report row as extracted by a parser, before coercion.
///
/// Numeric fields stay as the source text; `None` marks a cell the parser
/// could not read at all. The valid/invalid decision belongs to
/// [`normalizer::normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTradeRow {
    /// Composite product code cell, verbatim
    pub exchange_product_id: String,
    /// Product name cell, verbatim
    pub exchange_product_name: String,
    /// Delivery basis name cell, verbatim
    pub delivery_basis_name: String,
    /// Volume cell text
    pub volume: Option<String>,
    /// Total cell text
    pub total: Option<String>,
    /// Contract count cell text
    pub count: Option<String>,
    /// Report date, when the source embeds one
    pub trade_date: Option<NaiveDate>,
}

/// One unit of page work: a listing page index and its URL.
///
/// Immutable once created; consumed exactly once by a page pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTask {
    /// 1-based listing page index
    pub index: u32,
    /// Fully qualified listing page URL
    pub url: String,
}

impl PageTask {
    /// Create a new page task.
    pub fn new(index: u32, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
        }
    }
}
