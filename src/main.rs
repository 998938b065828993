use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use matcha_stockbot::{config, trigger};

#[derive(Debug, Parser)]
#[command(author, version, about = "Check the catalog once and alert on restock")]
struct Args {
    /// Optional YAML config file; environment variables override it
    #[arg(long)]
    config: Option<PathBuf>,
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

    match trigger::handle_request(&cfg).await {
        Ok(outcome) => {
            info!(outcome = outcome.as_str(), "stock check complete");
            println!("{outcome}");
            Ok(())
        }
        Err(err) => {
            error!(?err, "stock check failed");
            Err(err)
        }
    }
}
