mod cli;
mod commands;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use stockfeed_market_data::config::PROVIDERS_ENV;
use stockfeed_market_data::{ClientConfig, MarketDataClient};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Cli;

const LOG_FORMAT_ENV: &str = "STOCKFEED_LOG_FORMAT";

/// Logs go to stderr so stdout stays clean for results.
fn init_tracing() {
    let log_format = std::env::var(LOG_FORMAT_ENV).unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failures) => {
            tracing::warn!("{} request(s) failed", failures);
            ExitCode::FAILURE
        }
        Err(error) => {
            eprintln!("error: {:#}", error);
            ExitCode::from(2)
        }
    }
}

async fn run() -> anyhow::Result<usize> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    // --providers also decides which adapters get built, so keys for
    // providers outside the list are not required.
    let providers = cli.providers.clone();
    let config = ClientConfig::from_lookup(|key| match (key, &providers) {
        (PROVIDERS_ENV, Some(list)) => Some(list.clone()),
        _ => std::env::var(key).ok(),
    })
    .context("failed to load provider configuration")?;
    let client = MarketDataClient::from_config(config).context("failed to build client")?;
    tracing::debug!("Client ready: {:?}", client);

    commands::run(&cli, &client).await
}
