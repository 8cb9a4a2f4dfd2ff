//! Batch persistence
//!
//! One page's records form one batch and one transaction: all commit
//! together or none do. Duplicate ingestion across runs is accepted; the
//! table is append-only with an autoincrement key and no uniqueness
//! constraint on product id + date.
//!
//! Expected schema (managed externally):
//!
//! ```sql
//! CREATE TABLE trading_results (
//!     id                    BIGSERIAL PRIMARY KEY,
//!     exchange_product_id   VARCHAR(32)  NOT NULL,
//!     exchange_product_name VARCHAR(255) NOT NULL,
//!     oil_id                VARCHAR(4)   NOT NULL,
//!     delivery_basis_id     VARCHAR(3)   NOT NULL,
//!     delivery_basis_name   VARCHAR(255) NOT NULL,
//!     delivery_type_id      VARCHAR(1)   NOT NULL,
//!     volume                NUMERIC      NOT NULL,
//!     total                 NUMERIC      NOT NULL,
//!     count                 BIGINT       NOT NULL,
//!     trade_date            DATE         NOT NULL,
//!     created_at            TIMESTAMPTZ  NOT NULL,
//!     updated_at            TIMESTAMPTZ
//! );
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::debug;

use crate::TradeRecord;

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The database rejected the batch; the transaction was rolled back
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Destination for normalized record batches.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist one batch transactionally.
    ///
    /// Returns the number of records written. An empty batch is a no-op
    /// success that touches no connection.
    async fn save(&self, batch: &[TradeRecord]) -> Result<u64, PersistError>;
}

/// Postgres-backed sink for trade records.
#[derive(Clone)]
pub struct PgTradeRepository {
    pool: PgPool,
}

impl PgTradeRepository {
    /// Wrap an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordSink for PgTradeRepository {
    async fn save(&self, batch: &[TradeRecord]) -> Result<u64, PersistError> {
        if batch.is_empty() {
            debug!("empty batch, skipping save");
            return Ok(0);
        }

        let created_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        for record in batch {
            sqlx::query(
                r"
                INSERT INTO trading_results
                    (exchange_product_id, exchange_product_name, oil_id,
                     delivery_basis_id, delivery_basis_name, delivery_type_id,
                     volume, total, count, trade_date, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ",
            )
            .bind(&record.exchange_product_id)
            .bind(&record.exchange_product_name)
            .bind(&record.oil_id)
            .bind(&record.delivery_basis_id)
            .bind(&record.delivery_basis_name)
            .bind(&record.delivery_type_id)
            .bind(record.volume)
            .bind(record.total)
            .bind(record.count)
            .bind(record.trade_date)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        }

        // An early `?` return drops `tx`, rolling the whole batch back.
        tx.commit().await?;

        debug!(records = batch.len(), "batch committed");
        Ok(batch.len() as u64)
    }
}
