mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use nemfetch::config::Config;
use nemfetch::observability;
use nemfetch::pipeline::Pipeline;
use std::process::ExitCode;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[tokio::main]
async fn main() -> Result<ExitCode, AnyError> {
    let cli = Cli::parse();

    // config loading logs before the configured level is known
    let config = tracing::subscriber::with_default(observability::bootstrap_subscriber(), || {
        Config::load_with(cli.config.clone(), |config| cli.apply(config))
    })?;

    observability::init_tracing(&config.log_level);

    let range = config.range.to_range()?;

    match cli.command {
        Commands::Urls(_) => {
            for url in nemfetch::listing::generate_urls(&config.source.archive_root, range) {
                println!("{url}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Links(_) => {
            let pipeline = Pipeline::new(config)?;
            let discovered = pipeline.discover(range).await;
            for link in &discovered.links {
                println!("{link}");
            }
            Ok(exit_code(discovered.failed_listings.is_empty()))
        }
        Commands::Download(_) => {
            let pipeline = Pipeline::new(config)?;
            let report = pipeline.run(range).await?;
            Ok(exit_code(report.is_success()))
        }
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
