use super::model::StateRow;
use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

pub type Pool = SqlitePool;

/// Open a pool for `database_url`.
///
/// In-memory databases live only as long as their connection, so they get a
/// single connection that is never recycled.
pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = if normalized.starts_with("sqlite::memory") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(&normalized)
            .await?
    } else {
        let pool = SqlitePool::connect(&normalized).await?;
        // Enable WAL and stricter durability.
        sqlx::query("PRAGMA journal_mode=WAL;").execute(&pool).await?;
        sqlx::query("PRAGMA synchronous=FULL;").execute(&pool).await?;
        pool
    };
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/`, ensure the parent
/// directory exists and ask SQLite to create the file. Leaves in-memory and
/// non-sqlite URLs untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = format!("sqlite://{}", expanded_path);
    match query_part {
        Some(q) if q.contains("mode=") => {
            rebuilt.push('?');
            rebuilt.push_str(q);
        }
        Some(q) => {
            rebuilt.push('?');
            rebuilt.push_str(q);
            rebuilt.push_str("&mode=rwc");
        }
        None => rebuilt.push_str("?mode=rwc"),
    }
    rebuilt
}

/// Create the state table if it does not exist. `table` must already be a
/// validated identifier; it is interpolated, not bound.
#[instrument(skip(pool))]
pub async fn ensure_table(pool: &Pool, table: &str) -> sqlx::Result<()> {
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            date TEXT PRIMARY KEY NOT NULL,
            notified_at TEXT NOT NULL,
            in_stock_items TEXT NOT NULL
        )"
    );
    sqlx::query(&sql).execute(pool).await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn fetch_state_row(pool: &Pool, table: &str, date: &str) -> sqlx::Result<Option<StateRow>> {
    let sql = format!("SELECT date, notified_at, in_stock_items FROM {table} WHERE date = ?");
    let Some(row) = sqlx::query(&sql).bind(date).fetch_optional(pool).await? else {
        return Ok(None);
    };
    Ok(Some(StateRow {
        date: row.try_get("date")?,
        notified_at: row.try_get("notified_at")?,
        in_stock_items: row.try_get("in_stock_items")?,
    }))
}

/// Insert or fully replace the row for `row.date`.
#[instrument(skip_all, fields(date = %row.date))]
pub async fn upsert_state_row(pool: &Pool, table: &str, row: &StateRow) -> sqlx::Result<()> {
    let sql = format!(
        "INSERT INTO {table} (date, notified_at, in_stock_items) VALUES (?, ?, ?)
         ON CONFLICT(date) DO UPDATE SET
            notified_at = excluded.notified_at,
            in_stock_items = excluded.in_stock_items"
    );
    sqlx::query(&sql)
        .bind(&row.date)
        .bind(&row.notified_at)
        .bind(&row.in_stock_items)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete the row for `date`; returns how many rows went away (0 or 1).
#[instrument(skip(pool))]
pub async fn delete_state_row(pool: &Pool, table: &str, date: &str) -> sqlx::Result<u64> {
    let sql = format!("DELETE FROM {table} WHERE date = ?");
    let res = sqlx::query(&sql).bind(date).execute(pool).await?;
    Ok(res.rows_affected())
}

#[instrument(skip(pool))]
pub async fn count_state_rows(pool: &Pool, table: &str) -> sqlx::Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    sqlx::query_scalar::<_, i64>(&sql).fetch_one(pool).await
}
