//! Splitcast - monorepo split publisher
//!
//! CLI entry point that drives one synchronization run.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use console::style;
use splitcast::cli::Cli;
use splitcast::error::SplitcastResult;
use splitcast::split::LiteSplitter;
use splitcast::sync::Syncer;
use splitcast::workspace::WorkingSpace;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> SplitcastResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("splitcast=warn"),
        1 => EnvFilter::new("splitcast=info"),
        _ => EnvFilter::new("splitcast=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let config = splitcast::config::load(&cli.config).await?;

    let workspace = Arc::new(WorkingSpace::create(config).await?);

    // Ctrl-C stops queueing new transfers; in-flight ones are drained
    // by the flushes below before the mirror is removed.
    let signal_target = Arc::clone(&workspace);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling pending transfers");
            signal_target.remotes().cancel_all().await;
        }
    });

    let cache = workspace.cache().await?;
    cache.load().await?;

    let splitter = LiteSplitter::new();
    let result = Syncer::new(&workspace, cache.as_ref(), &splitter)
        .run(&cli.refs)
        .await;

    // Persist whatever the run managed to record, even on failure;
    // the syncer's error takes precedence over persistence errors
    let dumped = cache.dump().await;
    cache.push();
    let flushed = workspace.close().await;

    result.and(dumped).and(flushed)
}
