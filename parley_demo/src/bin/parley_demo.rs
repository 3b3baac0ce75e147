use anyhow::Context;
use clap::Parser;
use parley_core::utils::OrLog;
use parley_demo::{config::DemoConfig, tracing_config};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::util::SubscriberInitExt;

use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about = "Generate simulated chat traffic and log the resulting display refreshes")]
struct Opts {
    /// Demo config file location
    #[arg(short, long)]
    config: PathBuf,

    /// Override the number of messages to generate
    #[arg(short, long)]
    message_count: Option<usize>,
}

pub fn main() -> Result<(), anyhow::Error> {
    let opts = Opts::parse();

    let mut config = DemoConfig::load_file(&opts.config)?;
    if let Some(count) = opts.message_count {
        config.message_count = count;
    }

    tracing_config::build_subscriber(config.log.clone())
        .context("Couldn't set up logging")?
        .init();

    let runtime = tokio::runtime::Runtime::new()?;
    let summary = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c()
                .await
                .or_warn("listening for interrupt")
                .is_some()
            {
                tracing::info!("Interrupted; stopping");
                interrupt.cancel();
            }
        });

        parley_demo::run::run(config, cancel).await
    })?;

    tracing::info!(summary = %serde_json::to_string(&summary)?, "Demo finished");
    Ok(())
}
