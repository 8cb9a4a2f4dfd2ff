//! Spreadsheet attachment parser
//!
//! Decodes a binary workbook (XLS or XLSX, auto-detected) into a 2-D grid of
//! cell texts and hands the grid to the shared row scan.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDate;

use crate::parser::{scan_rows, ParseError, ReportLayout, ReportParser};
use crate::RawTradeRow;

/// Parser for binary spreadsheet report attachments.
#[derive(Debug, Clone)]
pub struct SpreadsheetParser {
    layout: ReportLayout,
    cutoff: NaiveDate,
}

impl SpreadsheetParser {
    /// Create a parser with the given column contract and cutoff date.
    pub fn new(layout: ReportLayout, cutoff: NaiveDate) -> Self {
        Self { layout, cutoff }
    }
}

impl ReportParser for SpreadsheetParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<RawTradeRow>, ParseError> {
        let cursor = Cursor::new(bytes.to_vec());
        let mut workbook = open_workbook_auto_from_rs(cursor)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(ParseError::NoSheet)??;

        let grid: Vec<Vec<String>> = range
            .rows()
            .skip(self.layout.skip_rows)
            .map(|row| row.iter().map(cell_text).collect())
            .collect();

        Ok(scan_rows(&grid, &self.layout, self.cutoff))
    }
}

/// Render one cell as text. Integral floats lose their fraction so that
/// count-style cells coerce cleanly downstream.
fn cell_text(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                format!("{f}")
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}
