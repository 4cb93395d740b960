//! # mp-runner
//!
//! Entry point for the market-pricing pipeline.
//!
//! Loads a JSON configuration file, builds the configured reader, source and
//! publisher, and runs them until the reader finishes or Ctrl+C is pressed.
//!
//! # Usage
//!
//! ```bash
//! mp-runner config.json --currencies AUD,JPY --base-currency EUR --updated-after 2022-01-01
//! ```

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use mp_core::FxRequest;
use tracing::{error, info};

/// Market Pricing Pipeline Runner.
#[derive(Parser)]
#[command(name = "mp-runner", about = "Market Pricing Pipeline Runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Comma-separated currencies to price (e.g. `AUD,JPY`).
    #[arg(long, value_delimiter = ',', required = true)]
    currencies: Vec<String>,

    /// Base (denominating) currency.
    #[arg(long)]
    base_currency: String,

    /// Only request observations updated after this timestamp.
    #[arg(long, default_value = "2022-01-01")]
    updated_after: String,

    /// Print to the console instead of the configured publisher.
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output (overrides `MarketPricing.log_path`).
    #[arg(long)]
    log_dir: Option<String>,
}

impl Cli {
    fn request(&self) -> Result<FxRequest> {
        let currencies: Vec<String> =
            self.currencies.iter().map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect();
        if currencies.is_empty() {
            bail!("--currencies must name at least one currency");
        }
        Ok(FxRequest {
            currencies,
            base_currency: self.base_currency.trim().to_string(),
            since: self.updated_after.trim().to_string(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration (logging needs the module name and log path)
    let config = mp_core::config::load_config(&cli.config)?;
    let log_dir = cli.log_dir.clone().or_else(|| config.log_path());

    // 2. Initialize logging
    mp_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), &config.module_name());
    info!("mp-runner starting, config={}, log_level={}", cli.config.display(), cli.log_level);

    // 3. Build the pipeline
    let request = cli.request()?;
    let coordinator = mp_runner::build_pipeline(&config, cli.dry_run)?;
    info!(
        "pricing {} against {} (updated after {})",
        request.currencies.join(","),
        request.base_currency,
        request.since
    );

    // 4. Run until the reader is done or Ctrl+C
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => {
                error!("cannot listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    let stats = coordinator.run(request, shutdown).await?;
    info!("pipeline stopped, {} record(s) published, goodbye", stats.published);
    Ok(())
}
