use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use clap::Parser;
use std::path::PathBuf;

use matcha_stockbot::config;
use matcha_stockbot::store::StateStore;
use matcha_stockbot::tracking::{current_tracking_date, tracking_zone};
use matcha_stockbot::trigger::open_store;

#[derive(Debug, Parser)]
#[command(author, version, about = "Print the stored notification state for a tracking date")]
struct Args {
    /// Optional YAML config file; environment variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tracking date (YYYY-MM-DD); defaults to today in Japan time
    #[arg(long)]
    date: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(args.config.as_deref())?;
    let date = args
        .date
        .unwrap_or_else(|| current_tracking_date(Utc::now(), &tracking_zone()));

    let store = open_store(&cfg).await?;
    match store.get(&date).await? {
        Some(state) => {
            println!("date: {}", state.date);
            println!(
                "notified_at: {}",
                state.notified_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            );
            println!("in_stock_items:");
            for item in &state.in_stock_items {
                println!("  - {item}");
            }
        }
        None => println!("no notification recorded for {date}"),
    }
    Ok(())
}
