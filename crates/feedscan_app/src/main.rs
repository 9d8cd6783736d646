mod cli;
mod config;
mod render;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use feedscan_engine::{ChromiumCapture, CredentialStore, FeedScanner, ReqwestFetcher, ScanRequest};
use scan_logging::{scan_info, scan_warn};
use tokio_util::sync::CancellationToken;

use crate::cli::Cli;
use crate::render::ConsoleProgress;

const LOG_FILE: &str = "./feedscan.log";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    scan_logging::initialize(cli.log_to.into(), cli.log_level, Path::new(LOG_FILE));

    let config = config::load(&cli.config)?;
    let fetcher = ReqwestFetcher::new(config.fetch.settings()).context("failed to build HTTP client")?;
    let capture =
        ChromiumCapture::new(config.capture.settings()).context("invalid capture settings")?;
    let mut scanner = FeedScanner::new(
        CredentialStore::new(&cli.credentials),
        fetcher,
        capture,
        config.scan_settings(),
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                scan_warn!("Interrupted; stopping after the current request");
                cancel.cancel();
            }
        }
    });

    let request = ScanRequest {
        budget: usize::try_from(cli.max_scans).context("--max-scans is too large")?,
        filter: cli.only_type.parse().unwrap_or_default(),
    };
    let outcome = scanner
        .scan(request, &ConsoleProgress, &cancel)
        .await
        .context("scan failed")?;
    scan_info!(
        "Scan complete: {} cards scanned, best like count {}",
        outcome.scanned,
        outcome.like_count
    );

    println!("{}", render::summary(&cli.only_type, cli.max_scans, &outcome)?);
    Ok(())
}
