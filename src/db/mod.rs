//! Database module: SQLite plumbing for the notification-state table.
//!
//! - `model`: the raw row shape as stored.
//! - `repo`: SQL-only functions; they know nothing about dates or stock.
//!
//! Callers normally go through `crate::store::SqliteStateStore`, which turns
//! rows into domain values and errors into `StoreError`.

pub mod model;
pub mod repo;

pub use model::StateRow;
pub use repo::*;
