use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use musync_cli::config::DEFAULT_CONFIG_PATH;
use musync_cli::{load_config, Scheduler};
use musync_core::prelude::*;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "musync")]
#[command(about = "Keeps local music folders in sync with remote playlists", long_about = None)]
struct Args {
    /// Path to the JSON config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable verbose logging, overriding the configured level
    #[arg(short, long)]
    verbose: bool,

    /// Run a single polling cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(&args.config).await?;

    // Initialize logging
    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::from(config.log_level)
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    debug!(?config, "loaded config");

    let ytdlp = Arc::new(YtDlp::from_config(&config.downloader));
    info!(
        binary = %ytdlp.binary().display(),
        playlists = config.playlists.len(),
        %log_level,
        "muSync started"
    );

    let playlists = config
        .playlists
        .iter()
        .map(|entry| Playlist::from_config(&config, entry))
        .collect();

    let mut scheduler = Scheduler::new(
        playlists,
        ytdlp.clone(),
        ytdlp,
        config.refresh_interval(),
        config.poll_interval(),
    );
    scheduler.sync_from_disk().await;

    if args.once {
        let outcome = scheduler.run_cycle(Utc::now()).await;
        info!(?outcome, "single cycle finished");
        return Ok(());
    }

    scheduler
        .run(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(%err, "unable to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("muSync stopped");
    Ok(())
}
