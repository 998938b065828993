//! Watches one catalog page for restocks and sends at most one alert per
//! tracking day, re-arming when the page sells out again.

pub mod catalog;
pub mod config;
pub mod db;
pub mod engine;
pub mod model;
pub mod notifier;
pub mod store;
pub mod tracking;
pub mod trigger;

pub use engine::{run_check, CheckError, StockChecker};
pub use model::{CheckOutcome, NotificationState, Product};
