//! Tracking-date arithmetic and the notification text.
//!
//! Every date the checker reasons about (the dedup key, the message timestamp)
//! comes from the one fixed zone below, never from the host's local time.

use chrono::{DateTime, FixedOffset, Utc};

use crate::model::Product;

/// Japan Standard Time. Japan observes no DST so a fixed offset is exact.
const JST_OFFSET_SECS: i32 = 9 * 3600;

pub const SHOP_NAME: &str = "Marukyu Koyamaen";

pub fn tracking_zone() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_SECS).expect("valid JST offset")
}

/// `YYYY-MM-DD` of `now` as seen in `zone`.
pub fn current_tracking_date(now: DateTime<Utc>, zone: &FixedOffset) -> String {
    now.with_timezone(zone).format("%Y-%m-%d").to_string()
}

/// Render the alert text: a header with the check time, then every fetched
/// product with its status, in page order.
pub fn format_message(products: &[Product], now: DateTime<Utc>, zone: &FixedOffset) -> String {
    let local = now.with_timezone(zone);
    let mut message = format!("{} Stock Check:\n\n", SHOP_NAME);
    message.push_str(&format!(
        "🕜 Last Checked: {} (Japan Time)\n\n",
        local.format("%a, %-d %b %-I:%M %p")
    ));
    for product in products {
        message.push_str(&format!(
            "🍵 Name: {}\n📦 Status: {}\n\n",
            product.title,
            product.status_label()
        ));
    }
    message
}
