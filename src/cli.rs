use clap::{Parser, Subcommand};
use nemfetch::config::{Config, RangeConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nemfetch")]
#[command(about = "Download historical market data from the AEMO MMSDM archive", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $NEMFETCH_CONFIG or config/nemfetch.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level, e.g. "info" or "debug"; RUST_LOG takes precedence
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover, download and extract every matching file in the range
    Download(DownloadArgs),
    /// Print the listing page URLs for the range
    Urls(RangeArgs),
    /// Print the candidate links found on the listing pages, without downloading
    Links(RangeArgs),
}

#[derive(clap::Args, Debug, Default)]
pub struct RangeArgs {
    #[arg(long)]
    pub start_year: Option<i32>,
    #[arg(long)]
    pub start_month: Option<u32>,
    #[arg(long)]
    pub end_year: Option<i32>,
    #[arg(long)]
    pub end_month: Option<u32>,
}

#[derive(clap::Args, Debug)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub range: RangeArgs,

    /// Destination directory override
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Maximum number of downloads in flight
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Write failed links as JSON to this file
    #[arg(long)]
    pub failure_report: Option<PathBuf>,
}

impl RangeArgs {
    fn apply(&self, range: &mut RangeConfig) {
        if let Some(year) = self.start_year {
            range.start_year = year;
        }
        if let Some(month) = self.start_month {
            range.start_month = month;
        }
        if let Some(year) = self.end_year {
            range.end_year = year;
        }
        if let Some(month) = self.end_month {
            range.end_month = month;
        }
    }
}

impl Cli {
    /// Layer command-line overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }

        match &self.command {
            Commands::Urls(range) | Commands::Links(range) => range.apply(&mut config.range),
            Commands::Download(args) => {
                args.range.apply(&mut config.range);
                if let Some(dir) = &args.data_dir {
                    config.download.output_path = dir.clone();
                }
                if let Some(n) = args.max_concurrent {
                    config.download.max_concurrent_requests = n;
                }
                if let Some(path) = &args.failure_report {
                    config.download.failure_report = Some(path.clone());
                }
            }
        }
    }
}
