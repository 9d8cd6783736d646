use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use scan_logging::LogDestination;

/// Find the most liked item in the news feed.
#[derive(Debug, Parser)]
#[command(name = "feedscan", version)]
pub struct Cli {
    /// Maximum number of results to scan.
    #[arg(long, default_value_t = 120, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_scans: u64,

    /// Filter results by type: all, article, video, webcontent, etc.
    #[arg(long, default_value = "all")]
    pub only_type: String,

    /// Where the captured request template is stored.
    #[arg(long, default_value = "feed_credentials.json")]
    pub credentials: PathBuf,

    /// Optional RON settings file.
    #[arg(long, default_value = "feedscan.ron")]
    pub config: PathBuf,

    #[arg(long, value_enum, default_value_t = LogTarget::File)]
    pub log_to: LogTarget,

    #[arg(long, default_value_t = LevelFilter::Info)]
    pub log_level: LevelFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    /// ./feedscan.log
    File,
    Terminal,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::File => LogDestination::File,
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both,
        }
    }
}
