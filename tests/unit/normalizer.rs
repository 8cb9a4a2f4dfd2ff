//! Normalizer tests over source-shaped raw rows.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;
use trade_results_ingestor::normalize;
use trade_results_ingestor::normalizer::ValidationError;
use trade_results_ingestor::RawTradeRow;

fn row() -> RawTradeRow {
    RawTradeRow {
        exchange_product_id: "A592ACH005A".to_string(),
        exchange_product_name: "Бензин (АИ-92-К5), ст. Ачинск-1".to_string(),
        delivery_basis_name: "ст. Ачинск-1".to_string(),
        volume: Some("1 080".to_string()),
        total: Some("62 177 083,2".to_string()),
        count: Some("11".to_string()),
        trade_date: NaiveDate::from_ymd_opt(2024, 6, 14),
    }
}

fn fallback() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

#[test]
fn test_normalize_full_row() {
    let record = normalize(&row(), fallback()).unwrap();
    assert_eq!(record.oil_id, "A592");
    assert_eq!(record.delivery_basis_id, "ACH");
    assert_eq!(record.delivery_type_id, "A");
    assert_eq!(record.volume, Decimal::from_str("1080").unwrap());
    assert_eq!(record.total, Decimal::from_str("62177083.2").unwrap());
    assert_eq!(record.count, 11);
    assert_eq!(record.trade_date, NaiveDate::from_ymd_opt(2024, 6, 14).unwrap());
    assert!(record.validate().is_ok());
}

#[test]
fn test_missing_cells_rejected() {
    let mut missing_volume = row();
    missing_volume.volume = None;
    assert!(matches!(
        normalize(&missing_volume, fallback()),
        Err(ValidationError::MissingField("volume"))
    ));

    let mut missing_count = row();
    missing_count.count = None;
    assert!(matches!(
        normalize(&missing_count, fallback()),
        Err(ValidationError::MissingField("count"))
    ));
}

#[test]
fn test_non_numeric_total_rejected() {
    let mut bad = row();
    bad.total = Some("договорная".to_string());
    assert!(matches!(
        normalize(&bad, fallback()),
        Err(ValidationError::NotNumeric { field: "total", .. })
    ));
}

#[test]
fn test_product_code_with_whitespace_trimmed() {
    let mut padded = row();
    padded.exchange_product_id = "  A592ACH005A  ".to_string();
    let record = normalize(&padded, fallback()).unwrap();
    assert_eq!(record.exchange_product_id, "A592ACH005A");
}

#[test]
fn test_fallback_date_applied_when_source_has_none() {
    let mut dateless = row();
    dateless.trade_date = None;
    let record = normalize(&dateless, fallback()).unwrap();
    assert_eq!(record.trade_date, fallback());
}
