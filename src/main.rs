mod catalog;
mod config;
mod hass;
mod models;
mod pipeline;
mod publisher;
mod scraper;
mod storage;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::hass::HassClient;
use crate::pipeline::Orchestrator;
use crate::publisher::{StateSink, StdoutSink};
use crate::scraper::http_client::HttpClient;

#[derive(Parser)]
#[command(name = "accu-health", about = "Allergy, air-quality and illness forecast sensors", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print states as JSON lines instead of sending them to Home Assistant
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Load sensors, then watch the trigger flags and refresh daily
    Run,

    /// Fetch every page fresh, then rebuild the sensors
    Fetch,

    /// Rebuild the sensors from the cached pages only
    Rebuild,

    /// Print what the cached pages currently say, without publishing
    Show,

    /// Show when the cache was last filled and what it holds
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "accu_health=info,warn",
        1 => "accu_health=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;
    let http = HttpClient::new(&config.source).context("Failed to build page client")?;

    // `show` and `status` only read the cache.
    let publishes = !matches!(cli.command, Command::Show | Command::Status);
    let hass = if publishes && !cli.dry_run {
        Some(HassClient::new(&config.hass)?)
    } else {
        None
    };
    let sink: &dyn StateSink = match &hass {
        Some(h) => h,
        None => &StdoutSink,
    };

    let orch = Orchestrator::new(&config, &http, sink);

    match cli.command {
        Command::Run => {
            let owned;
            let flags = match &hass {
                Some(h) => h,
                None => {
                    owned = HassClient::new(&config.hass)
                        .context("Flags are read from Home Assistant even in a dry run")?;
                    &owned
                }
            };
            info!(
                "Watching {} and {} (layout {:?})",
                config.hass.fetch_flag, config.hass.rebuild_flag, config.source.layout
            );
            pipeline::schedule::run(&orch, flags, &config).await?;
        }

        Command::Fetch => {
            let stats = orch.refresh().await?;
            info!(
                "Done: {} pages fetched, {} sensors published",
                stats.pages_fetched, stats.sensors_published
            );
        }

        Command::Rebuild => {
            let n = orch.rebuild().await?;
            info!("Done: {} sensors published", n);
        }

        Command::Show => {
            let forecasts = orch.extract_all()?;
            println!("{:<16} {:>8}  {:<28} {:>8}  {:<28}", "indicator", "today", "", "tomorrow", "");
            // Published values keep page padding; trim only for the table.
            for (ind, f) in &forecasts {
                println!(
                    "{:<16} {:>8}  {:<28} {:>8}  {:<28}",
                    ind.label,
                    f.today.value.trim(),
                    f.today.phrase.trim(),
                    f.tomorrow.value.trim(),
                    f.tomorrow.phrase.trim()
                );
            }
        }

        Command::Status => {
            let cache = orch.cache();
            println!("─────────────────────────────────");
            println!("  Cache : {}", cache.path().display());
            match cache.updated_timestamp() {
                Ok(stamp) => println!("  Last sourced : {}", stamp),
                Err(_) => println!("  Last sourced : never (run `accu-health fetch`)"),
            }
            println!("─────────────────────────────────");
            for (key, stored_at, len) in cache.entries()? {
                println!("  {:<10} {:>10}  {}", key, utils::fmt_size(len), stored_at);
            }
        }
    }

    Ok(())
}
