use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use stockbot::app::{self, Shutdown};
use stockbot::cli::{Args, Commands};
use stockbot::config::AppConfig;
use stockbot::logging::{LoggingOptions, VERBOSE_LOG_FILTER, init_logging};
use stockbot::panic_hook;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref()).context("failed to load configuration")?;

    if let Some(Commands::CheckConfig) = args.command {
        println!("{}", config.show()?);
        return Ok(());
    }

    let filter = if args.verbose {
        Some(VERBOSE_LOG_FILTER.to_string())
    } else {
        config.log_level.clone()
    };
    let forward_level = if config.forward_logs {
        Some(config.chat_log_level.parse::<tracing::Level>()?)
    } else {
        None
    };
    let mut logging = init_logging(&LoggingOptions {
        filter,
        log_dir: config.log_dir.clone(),
        forward_level,
    })?;
    panic_hook::install();

    info!(version = env!("CARGO_PKG_VERSION"), product = %config.product, "Starting stockbot");

    match app::run(config, logging.take_lines()).await {
        Ok(Shutdown::Signal) => info!("Stopped by signal"),
        Ok(Shutdown::Terminated) => info!("Terminated from chat"),
        Err(e) => {
            error!(error = %e, "Bot stopped");
            return Err(e.into());
        }
    }
    Ok(())
}
