//! Raw row normalization
//!
//! Derives the oil / delivery-basis / delivery-type sub-ids from the
//! composite product code and coerces the numeric cells. Any coercion
//! failure yields a [`ValidationError`], never a panic; invalid rows are
//! dropped from their batch by the caller.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::{RawTradeRow, TradeRecord, MIN_PRODUCT_ID_LEN};

/// Why a raw row failed normalization.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Product code too short (or not ASCII) to slice into sub-ids
    #[error("product code `{0}` cannot be decomposed")]
    UndecomposableProductId(String),

    /// A required cell was absent
    #[error("missing {0} cell")]
    MissingField(&'static str),

    /// A numeric cell did not coerce
    #[error("{field} value `{value}` is not numeric")]
    NotNumeric {
        /// Field name
        field: &'static str,
        /// Offending source text
        value: String,
    },

    /// A decimal field was negative
    #[error("{0} must be non-negative")]
    Negative(&'static str),

    /// Count was zero or negative
    #[error("count must be positive, got {0}")]
    NonPositiveCount(i64),
}

/// Normalize one raw row into a [`TradeRecord`].
///
/// `fallback_date` is used when the source did not embed a report date
/// (the HTML table variant).
pub fn normalize(row: &RawTradeRow, fallback_date: NaiveDate) -> Result<TradeRecord, ValidationError> {
    let id = row.exchange_product_id.trim();
    if !id.is_ascii() || id.len() < MIN_PRODUCT_ID_LEN {
        return Err(ValidationError::UndecomposableProductId(id.to_string()));
    }

    let volume = parse_decimal("volume", require("volume", row.volume.as_deref())?)?;
    let total = parse_decimal("total", require("total", row.total.as_deref())?)?;
    if volume < Decimal::ZERO {
        return Err(ValidationError::Negative("volume"));
    }
    if total < Decimal::ZERO {
        return Err(ValidationError::Negative("total"));
    }

    let count_text = require("count", row.count.as_deref())?.trim();
    let count: i64 = count_text
        .parse()
        .map_err(|_| ValidationError::NotNumeric {
            field: "count",
            value: count_text.to_string(),
        })?;
    if count < 1 {
        return Err(ValidationError::NonPositiveCount(count));
    }

    Ok(TradeRecord {
        exchange_product_id: id.to_string(),
        exchange_product_name: row.exchange_product_name.trim().to_string(),
        oil_id: id[..4].to_string(),
        delivery_basis_id: id[4..7].to_string(),
        delivery_basis_name: row.delivery_basis_name.trim().to_string(),
        delivery_type_id: id[id.len() - 1..].to_string(),
        volume,
        total,
        count,
        trade_date: row.trade_date.unwrap_or(fallback_date),
    })
}

fn require<'a>(
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, ValidationError> {
    value.ok_or(ValidationError::MissingField(field))
}

/// Coerce localized numeric text to a [`Decimal`].
///
/// Spaces (including NBSP) are always grouping noise. Comma handling follows
/// the source locale: with a period present, commas are thousands separators
/// and are stripped; otherwise a comma followed by exactly three digits is a
/// thousands separator, any other comma is the decimal point.
fn parse_decimal(field: &'static str, raw: &str) -> Result<Decimal, ValidationError> {
    let not_numeric = || ValidationError::NotNumeric {
        field,
        value: raw.to_string(),
    };

    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();
    if compact.is_empty() {
        return Err(not_numeric());
    }

    let cleaned = if compact.contains('.') {
        compact.replace(',', "")
    } else if let Some(pos) = compact.rfind(',') {
        let fraction_digits = compact.len() - pos - 1;
        if fraction_digits == 0 || (fraction_digits == 3 && !compact[pos + 1..].contains(',')) {
            compact.replace(',', "")
        } else {
            let mut s = compact.replace(',', "");
            // Re-insert the last comma as the decimal point.
            s.insert(s.len() - fraction_digits, '.');
            s
        }
    } else {
        compact
    };

    Decimal::from_str(&cleaned).map_err(|_| not_numeric())
}
