use chrono::{DateTime, Utc};
use std::fmt;

/// One catalog listing as seen during a single fetch pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub title: String,
    pub in_stock: bool,
}

impl Product {
    pub fn new(title: impl Into<String>, in_stock: bool) -> Self {
        Self {
            title: title.into(),
            in_stock,
        }
    }

    pub fn status_label(&self) -> &'static str {
        if self.in_stock {
            "✅ In Stock"
        } else {
            "❌ Out of Stock"
        }
    }
}

/// Titles of the in-stock products, in fetch order.
pub fn in_stock_titles(products: &[Product]) -> Vec<String> {
    products
        .iter()
        .filter(|p| p.in_stock)
        .map(|p| p.title.clone())
        .collect()
}

/// Persisted marker that a notification already went out for `date`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationState {
    pub date: String,
    pub notified_at: DateTime<Utc>,
    pub in_stock_items: Vec<String>,
}

/// Terminal result of one check cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    NoStock,
    NotificationSent,
    AlreadyNotified,
    StateCleared,
}

impl CheckOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckOutcome::NoStock => "no stock, no notification needed",
            CheckOutcome::NotificationSent => "notification sent",
            CheckOutcome::AlreadyNotified => "already notified today",
            CheckOutcome::StateCleared => "state cleared — ready for next restock",
        }
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
