//! The single externally visible operation: build collaborators from config
//! and run one check cycle.
use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::catalog::HttpCatalog;
use crate::config::Config;
use crate::db;
use crate::engine::run_check;
use crate::model::CheckOutcome;
use crate::notifier::TelegramNotifier;
use crate::store::SqliteStateStore;

/// Open the configured state table.
pub async fn open_store(cfg: &Config) -> Result<SqliteStateStore> {
    let pool = db::init_pool(&cfg.app.database_url)
        .await
        .with_context(|| format!("failed to open database {}", cfg.app.database_url))?;
    let store = SqliteStateStore::open(pool, &cfg.app.table_name)
        .await
        .context("failed to prepare notification state table")?;
    Ok(store)
}

/// One full invocation: fetch, decide, maybe notify, record.
pub async fn handle_request(cfg: &Config) -> Result<CheckOutcome> {
    info!("starting stock check");
    let catalog = HttpCatalog::from_config(cfg).context("failed to build catalog client")?;
    let notifier = TelegramNotifier::from_config(cfg).context("failed to build notifier")?;
    let store = open_store(cfg).await?;

    let outcome = run_check(&catalog, &store, &notifier, Utc::now()).await?;
    store.pool().close().await;
    Ok(outcome)
}
