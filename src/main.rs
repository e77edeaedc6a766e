use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

mod config;
mod download;
mod error;
mod models;
mod providers;
mod storage;
mod version;

use config::{Cli, Command, DownloadArgs, DownloadConfig, FileConfig};
use download::{DispatchOptions, DownloadRequest, Downloader};
use models::Provider;
use providers::betgenius::BetGeniusEndpoints;
use providers::{BetGeniusClient, ItemFetcher, ScheduleSource, SportradarClient};
use storage::JsonFilePersister;
use version::BuildInfo;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Version { verbose } => {
            println!("{}", BuildInfo::current().render(verbose));
            Ok(())
        }
        Command::Download(args) => {
            if let Err(e) = download(cli.config.as_deref(), args).await {
                error!("Download failed: {:#}", e);
                return Err(e);
            }
            Ok(())
        }
    }
}

async fn download(config_file: Option<&Path>, args: DownloadArgs) -> Result<()> {
    let file = FileConfig::load(config_file)?;
    let config = args.resolve(file.download)?;
    config.validate()?;

    info!(
        "Downloading {} data from {}",
        config.competition, config.provider
    );
    info!("Concurrency: {}", config.concurrency);
    info!("Output directory: {}", config.output_dir.display());

    let (schedule, fetcher) = build_provider(&config)?;
    let downloader = Downloader::new(
        schedule,
        fetcher,
        JsonFilePersister::new(&config.output_dir),
    );

    // Ctrl-C cancels outstanding games; every game still reports a result.
    let options = DispatchOptions {
        task_timeout: config.task_timeout(),
        ..Default::default()
    };
    let cancel = options.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling remaining downloads");
            cancel.cancel();
        }
    });

    let request = DownloadRequest {
        competition: config.competition,
        ready_status: config.provider.ready_status().to_string(),
        years: config.seasons.clone(),
        concurrency: config.concurrency,
        options,
    };
    let report = downloader.run(request, std::io::stdout()).await?;

    if report.failures.is_empty() {
        info!("All {} games downloaded", report.processed);
    } else {
        warn!(
            "{} of {} games downloaded, {} failed; see the error list above",
            report.succeeded(),
            report.processed,
            report.failures.len()
        );
    }
    Ok(())
}

fn build_provider(
    config: &DownloadConfig,
) -> Result<(Arc<dyn ScheduleSource>, Arc<dyn ItemFetcher>)> {
    let http = providers::http_client(config.http_timeout())?;

    match config.provider {
        Provider::Sportradar => {
            let mut client =
                SportradarClient::new(http, config.competition, &config.credentials.sportradar())?;
            if let Some(base_url) = &config.sportradar_base_url {
                client = client.with_base_url(base_url);
            }
            let client = Arc::new(client);
            Ok((client.clone(), client))
        }
        Provider::Betgenius => {
            let endpoints = match &config.betgenius_base_url {
                Some(base_url) => BetGeniusEndpoints::rooted_at(base_url),
                None => BetGeniusEndpoints::default(),
            };
            let client = Arc::new(BetGeniusClient::new(
                http,
                config.competition,
                &config.credentials.betgenius(),
                endpoints,
            )?);
            Ok((client.clone(), client))
        }
    }
}
