mod cli;
mod logging;
mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use notefold_core::{BatchOrchestrator, Settings};
use tracing::info;

use crate::cli::{Cli, Command};
use crate::scheduler::Scheduler;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = cli.verbose || logging::env_flag();
    let path = cli.command.config_path().clone();
    let settings = Settings::load(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    let _guard = logging::init(verbose, settings.log_file.as_deref());

    match cli.command {
        Command::Serve(_) => serve(settings),
        Command::Once(_) => {
            settings.ensure_directories().context("failed to create directories")?;
            let report = BatchOrchestrator::from_settings(settings)?
                .run()
                .context("batch run failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Plan(_) => {
            let plan = BatchOrchestrator::from_settings(settings)?
                .plan()
                .context("planning failed")?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(())
        }
        Command::Config(_) => {
            print!("{}", settings.to_yaml()?);
            Ok(())
        }
    }
}

fn serve(settings: Settings) -> Result<()> {
    settings.ensure_directories().context("failed to create directories")?;
    let interval = Duration::from_secs(settings.poll_interval_secs);
    info!(
        source = %settings.source_dir.display(),
        destination = %settings.destination_root.display(),
        interval_secs = settings.poll_interval_secs,
        "service started"
    );
    let scheduler = Scheduler::new(interval);
    let orchestrator =
        Arc::new(BatchOrchestrator::from_settings(settings)?.with_stop_flag(scheduler.stop_flag()));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    runtime.block_on(async move {
        let job = move || orchestrator.run().map_err(anyhow::Error::from);
        let shutdown = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        scheduler.run(job, shutdown).await
    });
    Ok(())
}
