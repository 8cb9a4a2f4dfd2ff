//! Report file parsers
//!
//! Turns raw report bytes into a sequence of [`RawTradeRow`]s. Two variants
//! exist, selected by configuration: [`spreadsheet::SpreadsheetParser`] for
//! binary attachments and [`html_table::HtmlTableParser`] for HTML result
//! pages. Both are pure: bytes in, rows out, no I/O.
//!
//! The spreadsheet variant runs a row-scanning state machine because the
//! source sheet mixes metadata, several unit-of-measure sections, and footer
//! rows with no stable header contract; positions and markers are the only
//! dependable structure.

use chrono::NaiveDate;
use tracing::debug;

use crate::RawTradeRow;

pub mod html_table;
pub mod spreadsheet;

pub use html_table::HtmlTableParser;
pub use spreadsheet::SpreadsheetParser;

/// Row marker opening the metric-ton section of a report.
pub const METRIC_TON_MARKER: &str = "Единица измерения: Метрическая тонна";

/// Row marker closing a section.
pub const TOTAL_MARKER: &str = "Итого";

/// Format of the report date embedded in the sheet header.
pub const REPORT_DATE_FORMAT: &str = "%d.%m.%Y";

/// Number of trailing characters holding the report date in its header cell.
const REPORT_DATE_LEN: usize = 10;

/// Parser errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Spreadsheet could not be decoded
    #[error("workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    /// Workbook contains no sheets
    #[error("workbook has no sheets")]
    NoSheet,

    /// Report bytes are not valid text
    #[error("report is not valid UTF-8 text")]
    NotText,

    /// A required table column is missing
    #[error("results table is missing column `{0}`")]
    MissingColumn(&'static str),
}

/// A report file parser: raw bytes to raw rows.
///
/// Implementations must be cheap to share across tasks; parsing itself is
/// CPU-bound and is offloaded to a blocking worker by the executor.
pub trait ReportParser: Send + Sync {
    /// Parse one report file into raw rows, preserving source row order.
    fn parse(&self, bytes: &[u8]) -> Result<Vec<RawTradeRow>, ParseError>;
}

/// Column contract for spreadsheet reports.
///
/// The exact positions are a contract with the source and shift across report
/// format versions, so they are values, not literals in the scan logic.
/// Indices are 0-based into the row after `skip_rows` header rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLayout {
    /// Header/metadata rows to skip before scanning
    pub skip_rows: usize,
    /// Column holding section markers and product codes
    pub marker_col: usize,
    /// Column holding the product name
    pub name_col: usize,
    /// Column holding the delivery basis name
    pub basis_col: usize,
    /// Column holding the contract volume
    pub volume_col: usize,
    /// Column holding the total traded amount
    pub total_col: usize,
    /// Column holding the contract count
    pub count_col: usize,
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            skip_rows: 3,
            marker_col: 1,
            name_col: 2,
            basis_col: 3,
            volume_col: 4,
            total_col: 5,
            count_col: 14,
        }
    }
}

/// Row-scan state for one report file. Scoped to a single parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Report date not yet confirmed against the cutoff; nothing is emitted
    AwaitingDate,
    /// Date confirmed but the cursor is outside a metric-ton section
    OutsideSection,
    /// Inside the metric-ton section; data rows are emitted
    InsideSection,
}

/// Scan a 2-D grid of cell texts and emit candidate rows.
///
/// The grid must already have `skip_rows` applied. Row order is preserved;
/// the state machine is order-dependent.
///
/// Transitions:
/// - `AwaitingDate -> OutsideSection` once the embedded report date (last 10
///   chars of the marker cell, `%d.%m.%Y`) parses and is >= `cutoff`.
/// - `OutsideSection -> InsideSection` on the metric-ton marker row.
/// - `InsideSection -> OutsideSection` on the `Итого` row.
///
/// Rows whose count cell fails integer coercion are skipped with a debug log;
/// trailing spacer and subtotal rows are expected, not fatal.
pub fn scan_rows(grid: &[Vec<String>], layout: &ReportLayout, cutoff: NaiveDate) -> Vec<RawTradeRow> {
    let mut state = ScanState::AwaitingDate;
    let mut report_date: Option<NaiveDate> = None;
    let mut rows = Vec::new();

    for (row_idx, row) in grid.iter().enumerate() {
        let marker = cell(row, layout.marker_col);

        match state {
            ScanState::AwaitingDate => {
                if let Some(date) = trailing_date(marker) {
                    if date >= cutoff {
                        report_date = Some(date);
                        state = ScanState::OutsideSection;
                    } else {
                        // Report predates the cutoff; the date never confirms
                        // and every row of this file stays discarded.
                        debug!(%date, %cutoff, "report date before cutoff");
                    }
                }
            }
            ScanState::OutsideSection => {
                if marker == METRIC_TON_MARKER {
                    state = ScanState::InsideSection;
                }
            }
            ScanState::InsideSection => {
                if marker == TOTAL_MARKER {
                    state = ScanState::OutsideSection;
                    continue;
                }

                let count = cell(row, layout.count_col);
                if count.parse::<i64>().is_err() {
                    debug!(row = row_idx, count, "count cell not an integer, skipping row");
                    continue;
                }

                rows.push(RawTradeRow {
                    exchange_product_id: marker.to_string(),
                    exchange_product_name: cell(row, layout.name_col).to_string(),
                    delivery_basis_name: cell(row, layout.basis_col).to_string(),
                    volume: non_empty(cell(row, layout.volume_col)),
                    total: non_empty(cell(row, layout.total_col)),
                    count: Some(count.to_string()),
                    trade_date: report_date,
                });
            }
        }
    }

    rows
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("").trim()
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse the report date from the last 10 characters of a header cell,
/// e.g. `"Дата торгов: 14.06.2024"`.
fn trailing_date(cell: &str) -> Option<NaiveDate> {
    if cell.len() < REPORT_DATE_LEN {
        return None;
    }
    // The date suffix is ASCII; get() refuses a non-boundary split on
    // localized text rather than panicking.
    let suffix = cell.get(cell.len() - REPORT_DATE_LEN..)?;
    NaiveDate::parse_from_str(suffix, REPORT_DATE_FORMAT).ok()
}
