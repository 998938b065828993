//! Row shapes returned by the repository.

/// One notification-state row exactly as stored: `notified_at` is RFC 3339,
/// `in_stock_items` a JSON array of titles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRow {
    pub date: String,
    pub notified_at: String,
    pub in_stock_items: String,
}
