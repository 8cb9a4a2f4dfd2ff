//! HTML results-table parser
//!
//! Some report variants are plain HTML pages carrying a `trading-results`
//! table instead of a spreadsheet attachment. Columns are resolved by their
//! localized header names, not positions, because the table does carry a
//! header contract.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::parser::{ParseError, ReportParser};
use crate::RawTradeRow;

/// Header captions identifying the columns we extract.
const COL_PRODUCT_ID: &str = "Код инструмента";
const COL_PRODUCT_NAME: &str = "Наименование инструмента";
const COL_BASIS_NAME: &str = "Базис поставки";
const COL_VOLUME: &str = "Объем договоров";
const COL_TOTAL: &str = "Сумма сделок";
const COL_COUNT: &str = "Количество договоров";

static TABLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table.trading-results").expect("valid selector"));
static TH: Lazy<Selector> = Lazy::new(|| Selector::parse("th").expect("valid selector"));
static TR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));
static TD: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("valid selector"));

/// Parser for HTML report pages with an embedded results table.
#[derive(Debug, Clone, Default)]
pub struct HtmlTableParser;

impl HtmlTableParser {
    /// Create a new HTML table parser.
    pub fn new() -> Self {
        Self
    }
}

impl ReportParser for HtmlTableParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<RawTradeRow>, ParseError> {
        let text = std::str::from_utf8(bytes).map_err(|_| ParseError::NotText)?;
        let document = Html::parse_document(text);

        let Some(table) = document.select(&TABLE).next() else {
            // A page without the table lists no trades; normal, not an error.
            debug!("no trading-results table in report page");
            return Ok(Vec::new());
        };

        let headers: Vec<String> = table.select(&TH).map(|th| element_text(&th)).collect();
        let col = |name: &'static str| -> Result<usize, ParseError> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or(ParseError::MissingColumn(name))
        };

        let id_col = col(COL_PRODUCT_ID)?;
        let name_col = col(COL_PRODUCT_NAME)?;
        let basis_col = col(COL_BASIS_NAME)?;
        let volume_col = col(COL_VOLUME)?;
        let total_col = col(COL_TOTAL)?;
        let count_col = col(COL_COUNT)?;

        let mut rows = Vec::new();
        // First tr is the header row.
        for tr in table.select(&TR).skip(1) {
            let cells: Vec<String> = tr.select(&TD).map(|td| element_text(&td)).collect();
            if cells.len() < headers.len() {
                continue;
            }

            rows.push(RawTradeRow {
                exchange_product_id: cells[id_col].clone(),
                exchange_product_name: cells[name_col].clone(),
                delivery_basis_name: cells[basis_col].clone(),
                volume: non_empty(&cells[volume_col]),
                total: non_empty(&cells[total_col]),
                count: non_empty(&cells[count_col]),
                trade_date: None,
            });
        }

        Ok(rows)
    }
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
