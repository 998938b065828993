//! Notification-state store: get/put/delete of one record per tracking date.
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::is_valid_table_name;
use crate::db::{self, Pool, StateRow};
use crate::model::NotificationState;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid table name {0:?}")]
    InvalidTableName(String),
    #[error("failed to read notification state: {0}")]
    Read(#[source] sqlx::Error),
    #[error("failed to write notification state: {0}")]
    Write(#[source] sqlx::Error),
    #[error("failed to delete notification state: {0}")]
    Delete(#[source] sqlx::Error),
    #[error("stored notification state for {date} is unreadable: {reason}")]
    Corrupt { date: String, reason: String },
}

/// Keyed record store behind the decision engine. `get` returning `Ok(None)`
/// means "no record", which is never conflated with a failed read.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, date: &str) -> Result<Option<NotificationState>, StoreError>;

    /// Full replace of the record for `date`.
    async fn put(
        &self,
        date: &str,
        notified_at: DateTime<Utc>,
        in_stock_items: &[String],
    ) -> Result<(), StoreError>;

    /// Idempotent: deleting a missing record succeeds.
    async fn delete(&self, date: &str) -> Result<(), StoreError>;
}

/// `StateStore` backed by one SQLite table.
#[derive(Debug, Clone)]
pub struct SqliteStateStore {
    pool: Pool,
    table: String,
}

impl SqliteStateStore {
    /// Wrap `pool`, creating `table` if needed.
    pub async fn open(pool: Pool, table: &str) -> Result<Self, StoreError> {
        if !is_valid_table_name(table) {
            return Err(StoreError::InvalidTableName(table.to_string()));
        }
        db::ensure_table(&pool, table)
            .await
            .map_err(StoreError::Write)?;
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

fn encode(date: &str, notified_at: DateTime<Utc>, items: &[String]) -> Result<StateRow, StoreError> {
    let in_stock_items = serde_json::to_string(items).map_err(|e| StoreError::Corrupt {
        date: date.to_string(),
        reason: e.to_string(),
    })?;
    Ok(StateRow {
        date: date.to_string(),
        notified_at: notified_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        in_stock_items,
    })
}

fn decode(row: StateRow) -> Result<NotificationState, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        date: row.date.clone(),
        reason,
    };
    let notified_at = DateTime::parse_from_rfc3339(&row.notified_at)
        .map_err(|e| corrupt(format!("notified_at: {e}")))?
        .with_timezone(&Utc);
    let in_stock_items: Vec<String> = serde_json::from_str(&row.in_stock_items)
        .map_err(|e| corrupt(format!("in_stock_items: {e}")))?;
    Ok(NotificationState {
        date: row.date,
        notified_at,
        in_stock_items,
    })
}

#[async_trait]
impl StateStore for SqliteStateStore {
    #[instrument(skip(self))]
    async fn get(&self, date: &str) -> Result<Option<NotificationState>, StoreError> {
        let row = db::fetch_state_row(&self.pool, &self.table, date)
            .await
            .map_err(StoreError::Read)?;
        debug!(found = row.is_some(), "looked up notification state");
        row.map(decode).transpose()
    }

    #[instrument(skip(self, in_stock_items), fields(items = in_stock_items.len()))]
    async fn put(
        &self,
        date: &str,
        notified_at: DateTime<Utc>,
        in_stock_items: &[String],
    ) -> Result<(), StoreError> {
        let row = encode(date, notified_at, in_stock_items)?;
        db::upsert_state_row(&self.pool, &self.table, &row)
            .await
            .map_err(StoreError::Write)?;
        info!("recorded notification state");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, date: &str) -> Result<(), StoreError> {
        let removed = db::delete_state_row(&self.pool, &self.table, date)
            .await
            .map_err(StoreError::Delete)?;
        info!(removed, "cleared notification state");
        Ok(())
    }
}
