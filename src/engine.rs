//! Stock decision engine: one fetch, one state read, then at most one notify
//! and one state write or delete, strictly in that order.
//!
//! | stored state | in-stock items | action               | outcome          |
//! |--------------|----------------|----------------------|------------------|
//! | absent       | empty          | none                 | `NoStock`        |
//! | absent       | non-empty      | send, then put       | `NotificationSent` |
//! | present      | non-empty      | none                 | `AlreadyNotified` |
//! | present      | empty          | delete               | `StateCleared`   |

use chrono::{DateTime, FixedOffset, Utc};
use thiserror::Error;
use tracing::{info, instrument};

use crate::catalog::{CatalogSource, FetchError};
use crate::model::{in_stock_titles, CheckOutcome};
use crate::notifier::{Notifier, NotifyError};
use crate::store::{StateStore, StoreError};
use crate::tracking::{current_tracking_date, format_message, tracking_zone};

/// A failed cycle, tagged with the step that failed.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("failed to fetch catalog: {0}")]
    Fetch(#[source] FetchError),
    #[error("failed to read notification state: {0}")]
    StateRead(#[source] StoreError),
    #[error("failed to send notification: {0}")]
    Notify(#[source] NotifyError),
    #[error("notification sent but failed to record state: {0}")]
    StateWrite(#[source] StoreError),
    #[error("failed to clear notification state: {0}")]
    StateClear(#[source] StoreError),
}

/// The three collaborators one cycle runs against.
#[derive(Clone, Copy)]
pub struct StockChecker<'a> {
    catalog: &'a dyn CatalogSource,
    store: &'a dyn StateStore,
    notifier: &'a dyn Notifier,
    zone: FixedOffset,
}

impl<'a> StockChecker<'a> {
    pub fn new(
        catalog: &'a dyn CatalogSource,
        store: &'a dyn StateStore,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            catalog,
            store,
            notifier,
            zone: tracking_zone(),
        }
    }

    pub fn with_zone(mut self, zone: FixedOffset) -> Self {
        self.zone = zone;
        self
    }

    /// Run one cycle as of `now`.
    #[instrument(skip_all)]
    pub async fn run(&self, now: DateTime<Utc>) -> Result<CheckOutcome, CheckError> {
        let products = self.catalog.fetch().await.map_err(CheckError::Fetch)?;
        let date = current_tracking_date(now, &self.zone);
        let in_stock = in_stock_titles(&products);
        info!(
            products = products.len(),
            in_stock = in_stock.len(),
            %date,
            "catalog checked"
        );

        let state = self.store.get(&date).await.map_err(CheckError::StateRead)?;

        let outcome = match (state, in_stock.is_empty()) {
            (None, true) => CheckOutcome::NoStock,
            (None, false) => {
                let message = format_message(&products, now, &self.zone);
                self.notifier
                    .send(&message)
                    .await
                    .map_err(CheckError::Notify)?;
                self.store
                    .put(&date, now, &in_stock)
                    .await
                    .map_err(CheckError::StateWrite)?;
                CheckOutcome::NotificationSent
            }
            (Some(_), false) => CheckOutcome::AlreadyNotified,
            (Some(_), true) => {
                self.store
                    .delete(&date)
                    .await
                    .map_err(CheckError::StateClear)?;
                CheckOutcome::StateCleared
            }
        };
        info!(%date, outcome = outcome.as_str(), "check finished");
        Ok(outcome)
    }
}

/// Run one cycle with the default tracking zone.
pub async fn run_check(
    catalog: &dyn CatalogSource,
    store: &dyn StateStore,
    notifier: &dyn Notifier,
    now: DateTime<Utc>,
) -> Result<CheckOutcome, CheckError> {
    StockChecker::new(catalog, store, notifier).run(now).await
}
