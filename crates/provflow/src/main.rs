use clap::Parser;
use colored::Colorize;
use provflow::cli::Cli;
use provflow::{ProvisionStep, Provisioner};
use provflow_core::{ProcessExecutor, StepSequencer};
use provflow_gcloud::Gcloud;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Exit status after Ctrl-C, as a shell reports SIGINT
const INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr, progress to stdout
    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    // Template guards never drop on an interrupt; restore them here.
    // Blocking prompts hold the main thread, so this runs on a worker.
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received Ctrl+C, restoring open templates");
            for path in provflow_core::template::restore_pending() {
                eprintln!("Restored {}", path.display());
            }
            eprintln!("{}", "Provisioning interrupted.".yellow());
            std::process::exit(INTERRUPTED);
        }
    });

    let gcloud = Gcloud::new(Arc::new(ProcessExecutor)).strict(cli.strict);
    let sequencer = StepSequencer::stdio(ProvisionStep::ALL.len()).assume_yes(cli.yes);
    let mut provisioner = Provisioner::new(cli.config(), gcloud, sequencer);

    let result = provisioner.run().await;
    // Release stdin and any template guard before exiting
    drop(provisioner);

    match result {
        Ok(()) => {
            println!();
            println!("{}", "✓ Provisioning complete".green().bold());
            Ok(())
        }
        Err(e) if provflow::is_user_abort(&e) => {
            println!("{}", "Provisioning aborted by operator.".yellow());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(provflow::exit_code(&e));
        }
    }
}
